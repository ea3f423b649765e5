use crate::types::{TranscriptSegment, WordTiming};

/// まだ話されていない文字の不透明度の下限
///
/// 完全に不可視にはせず、うっすらと見せておく。
pub const UNSPOKEN_FLOOR: f32 = 0.35;

/// リビールウィンドウの最小値（秒）
///
/// スパン0の単語でもゼロ除算にならないように下駄を履かせる。
pub const MIN_REVEAL_WINDOW: f64 = 0.05;

/// 単語内の1文字あたりのずらし時間の上限（秒）
pub const CHAR_STAGGER_SECS: f64 = 0.02;

/// セグメントの各文字の不透明度を計算する純粋関数
///
/// 描画ティックごとに呼ばれ、ライブ（経過時刻 = キャプチャクロック）でも
/// 再生時（経過時刻 = オーディオプレイヤークロック）でも同一に動作する。
///
/// # Arguments
///
/// * `segment` - 対象セグメント
/// * `elapsed` - ストリーム開始からの経過時刻（秒）
///
/// # Returns
///
/// `segment.text` の1文字につき1つの不透明度 (0.0 ~ 1.0)。
/// 単語タイミングを持たないセグメントはセグメントが存在した時点で
/// 全文字が完全に可視となる（タイミングなしの過去録音は静的表示）。
///
/// 固定のセグメントに対して `elapsed` について単調非減少であることが
/// 保証される。一度「話された」文字が再び薄くなることはない。
pub fn char_opacities(segment: &TranscriptSegment, elapsed: f64) -> Vec<f32> {
    let char_count = segment.text.chars().count();

    if segment.word_timings.is_empty() {
        return vec![1.0; char_count];
    }

    // セグメント相対の経過時刻。単語オフセットはセグメント開始からの相対値
    let local_elapsed = elapsed - segment.start_time;

    let mut opacities = Vec::with_capacity(char_count);
    let mut words_started = 0usize;
    let mut char_in_word = 0usize;
    let mut prev_was_word_char = false;

    for c in segment.text.chars() {
        if c.is_whitespace() {
            // 区切り文字は直前の単語に帰属する
            char_in_word += 1;
            prev_was_word_char = false;
        } else {
            if !prev_was_word_char {
                words_started += 1;
                char_in_word = 0;
            } else {
                char_in_word += 1;
            }
            prev_was_word_char = true;
        }

        // 先頭の区切り文字は最初の単語に、過剰な単語は最後のタイミングに割り当てる
        let word_index = words_started.saturating_sub(1).min(segment.word_timings.len() - 1);
        let timing = &segment.word_timings[word_index];

        opacities.push(word_opacity(timing, char_in_word, local_elapsed));
    }

    opacities
}

/// 1文字の不透明度を計算
///
/// # Arguments
///
/// * `timing` - 文字が属する単語のタイミング
/// * `char_index_in_word` - 単語内での文字位置（0始まり）
/// * `elapsed` - セグメント開始からの相対経過時刻（秒）
pub fn word_opacity(timing: &WordTiming, char_index_in_word: usize, elapsed: f64) -> f32 {
    // まだこの単語に到達していない
    if elapsed < timing.start_offset {
        return UNSPOKEN_FLOOR;
    }

    // 単語の終端を過ぎたら完全可視。上流のタイミングが実際の発話より
    // 短く見積もられていても、一度話されたテキストは戻らない
    if elapsed >= timing.start_offset + timing.span {
        return 1.0;
    }

    let reveal_window = timing.span.max(MIN_REVEAL_WINDOW);

    // 文字ごとのずらしは単語自身のウィンドウを超えないように抑える
    let stagger = char_index_in_word as f64 * CHAR_STAGGER_SECS.min(reveal_window / 8.0);

    let progress = ((elapsed - timing.start_offset - stagger) / reveal_window).clamp(0.0, 1.0);
    let smoothed = progress * progress * (3.0 - 2.0 * progress);

    UNSPOKEN_FLOOR + (1.0 - UNSPOKEN_FLOOR) * smoothed as f32
}
