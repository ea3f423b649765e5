use crate::types::{TimedRun, WordTiming};

/// 整列済み発話タイミング
///
/// タイミング付きランから算出した、発話全体の絶対開始時刻・持続時間と
/// 単語単位の相対タイミング。
#[derive(Clone, Debug)]
pub struct AlignedUtterance {
    /// 発話の絶対開始時刻（秒、エンジンクロック）
    pub start_time: f64,

    /// 発話全体の持続時間（秒）
    pub span: f64,

    /// セグメント開始からの相対オフセットを持つ単語タイミング列
    pub word_timings: Vec<WordTiming>,
}

/// タイミング付きランを単語単位のタイミングへ整列する
///
/// 各ランのテキストを空白で単語に分割し、ランの持続時間を
/// 文字数の比率で単語に配分する。末尾以外の単語の文字数には
/// 後続の区切り文字を含めることで、区切りの時間が正しく
/// 前の単語に帰属する。単語はラン内でオフセットを累積しながら
/// 隙間なく並べられる。
///
/// 全ランにわたる最小開始時刻と最大終了時刻が、発話全体の
/// 開始時刻と持続時間を決める。
///
/// # Returns
///
/// どのランも単語を供給しなかった場合は `None` を返し、
/// 呼び出し側は粗い推定へフォールバックする。
///
/// # Edge cases
///
/// - 文字数0のランは丸ごとスキップされる
/// - 先頭の区切り文字は単語を生成せずにオフセット累積のみを進める
///   （空の単語をスキップしても配分の厳密さは崩れない）
/// - 負の持続時間は0として扱う
pub fn align_runs(runs: &[TimedRun]) -> Option<AlignedUtterance> {
    // まず発話全体の時刻範囲を確定する
    let mut start_time = f64::INFINITY;
    let mut end_time = f64::NEG_INFINITY;

    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        let duration = run.duration.max(0.0);
        start_time = start_time.min(run.start);
        end_time = end_time.max(run.start + duration);
    }

    if !start_time.is_finite() {
        return None;
    }

    let mut word_timings = Vec::new();

    for run in runs {
        let total_chars = run.text.chars().count();
        if total_chars == 0 {
            continue;
        }
        let duration = run.duration.max(0.0);

        // ラン内のオフセット累積（秒）
        let mut offset_in_run = 0.0f64;

        for (word, weight_chars) in weighted_words(&run.text) {
            let share = weight_chars as f64 / total_chars as f64;
            let allocated = duration * share;

            if let Some(word) = word {
                word_timings.push(WordTiming {
                    word,
                    start_offset: run.start - start_time + offset_in_run,
                    span: allocated,
                });
            }

            offset_in_run += allocated;
        }
    }

    if word_timings.is_empty() {
        return None;
    }

    Some(AlignedUtterance {
        start_time,
        span: end_time - start_time,
        word_timings,
    })
}

/// テキストを重み付き単語列に分解する
///
/// 各要素は `(単語, 文字数の重み)`。末尾以外の単語の重みには後続の
/// 区切り文字数が含まれる。先頭の区切り文字は `(None, 区切り文字数)`
/// として返され、オフセット累積のみに寄与する。
fn weighted_words(text: &str) -> Vec<(Option<String>, usize)> {
    let mut tokens: Vec<(Option<String>, usize)> = Vec::new();
    let mut current_word = String::new();
    let mut current_chars = 0usize;
    let mut pending_separators = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            if current_chars > 0 {
                tokens.push((Some(std::mem::take(&mut current_word)), current_chars));
                current_chars = 0;
            }
            pending_separators += 1;
        } else {
            if pending_separators > 0 {
                match tokens.last_mut() {
                    // 区切り文字は直前の単語に帰属させる
                    Some((Some(_), weight)) => *weight += pending_separators,
                    // 先頭の区切り文字はオフセットのみを進める
                    _ => tokens.push((None, pending_separators)),
                }
                pending_separators = 0;
            }
            current_word.push(c);
            current_chars += 1;
        }
    }

    if current_chars > 0 {
        tokens.push((Some(current_word), current_chars));
    }
    // 末尾の区切り文字はどの単語にも帰属しない

    tokens
}
