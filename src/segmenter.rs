use crate::config::SegmenterConfig;
use crate::types::{
    RecognitionEvent, SegmenterState, SessionTranscript, TimedRun, TranscriptSegment,
    TranscriptSnapshot, WordTiming,
};
use crate::word_timing;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// ライブ音声セグメンテーション状態機械
///
/// 認識エンジンからのイベント列を消費し、部分/確定を分類し、
/// 重複を排除し、確定セグメントの時刻範囲と単語タイミングを計算して、
/// 伸びていくセグメント列全体の順序不変条件を強制する。
///
/// このオブジェクトは単一のタスクが所有する前提で設計されている。
/// 確定列と進行中の部分テキストを変更するのはその所有タスクのみで、
/// 読み手（描画ティック・永続化）は `subscribe()` で得られる
/// 不変スナップショットを監視する。
///
/// # 状態遷移
///
/// ```text
/// Idle → Listening → (発話ごとに) Accumulating ⇄ Listening → … → Stopped
/// ```
///
/// # 順序不変条件
///
/// 確定列の任意の隣接セグメント a, b (a が先) について
/// `b.start_time >= a.start_time + a.span` が成立する。
/// 違反する確定結果は拒否せず、不足分だけ前方へクランプする。
pub struct SpeechSegmenter {
    state: SegmenterState,
    segments: Vec<TranscriptSegment>,
    partial_text: String,

    /// 重複排除メモリ: 直前に確定したトリム済みテキスト
    ///
    /// 認識エンジンが同じ発話のエコーを再送する既知の癖への対処
    last_finalized_text: Option<String>,

    /// 新規確定セグメントに加算される時刻補正（秒）
    ///
    /// 一時停止から再開した録音のタイムスタンプを連続に保つ
    base_offset: f64,

    next_id: u64,
    nominal_span_secs: f64,
    span_per_word_secs: f64,
    snapshot_tx: watch::Sender<TranscriptSnapshot>,
}

impl SpeechSegmenter {
    pub fn new(config: &SegmenterConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(TranscriptSnapshot::default());
        Self {
            state: SegmenterState::Idle,
            segments: Vec::new(),
            partial_text: String::new(),
            last_finalized_text: None,
            base_offset: 0.0,
            next_id: 0,
            nominal_span_secs: config.nominal_span_secs,
            span_per_word_secs: config.span_per_word_secs,
            snapshot_tx,
        }
    }

    /// スナップショットの受信側を取得
    ///
    /// 受信側は常に最新の発行値を読める。描画ティックや永続化の
    /// 読み手が多少古いスナップショットを観測しても安全。
    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// セッションを開始
    ///
    /// 確定列・部分テキスト・重複排除メモリ・ベースオフセットを
    /// すべてリセットして `Listening` に遷移する。
    /// 認可やエンジンの可用性の確認は呼び出し側の責務。
    pub fn start(&mut self) {
        self.segments.clear();
        self.partial_text.clear();
        self.last_finalized_text = None;
        self.base_offset = 0.0;
        self.next_id = 0;
        self.state = SegmenterState::Listening;
        log::info!("セグメンテーションを開始しました");
        self.publish();
    }

    /// 認識イベントを1つ処理
    pub fn handle_event(&mut self, event: RecognitionEvent) {
        // 開始前・停止後のイベントはストリームの残滓なので無視する
        if !matches!(
            self.state,
            SegmenterState::Listening | SegmenterState::Accumulating
        ) {
            log::debug!("非アクティブ状態でイベントを受信: {:?}", self.state);
            return;
        }

        match event {
            RecognitionEvent::Partial { text } => self.handle_partial(text),
            RecognitionEvent::Final {
                text,
                runs,
                finalized_at,
            } => self.handle_final(text, runs, finalized_at),
            RecognitionEvent::Error { message } => {
                // 文字起こしは停止するが、確定済みセグメントは有効なまま
                log::error!("認識ストリームエラー: {}", message);
                self.state = SegmenterState::Stopped;
                self.publish();
            }
        }
    }

    /// 部分結果: 進行中テキストを丸ごと置き換える
    fn handle_partial(&mut self, text: String) {
        self.partial_text = text;
        self.state = SegmenterState::Accumulating;
        self.publish();
    }

    /// 確定結果: 重複排除・時刻解決・クランプ・追加
    fn handle_final(&mut self, text: String, runs: Vec<TimedRun>, finalized_at: Option<f64>) {
        let trimmed = text.trim();

        // 空または直前の確定と同一のテキストは同じ発話のエコーとみなして破棄。
        // これはエラーではなく日常的なストリームノイズ
        if trimmed.is_empty() {
            log::debug!("空の確定結果を破棄");
            return;
        }
        if self.last_finalized_text.as_deref() == Some(trimmed) {
            log::debug!("重複した確定結果を破棄: {}", trimmed);
            return;
        }

        let (raw_start, span, word_timings) = self.resolve_timing(trimmed, &runs, finalized_at);

        // ベースオフセットを加算してから時刻の下限と単調性を強制する
        let mut start_time = (raw_start + self.base_offset).max(0.0);
        if let Some(prev) = self.segments.last() {
            let prev_end = prev.end_time();
            if start_time < prev_end {
                log::debug!(
                    "セグメント開始時刻をクランプ: {:.3} -> {:.3}",
                    start_time,
                    prev_end
                );
                start_time = prev_end;
            }
        }

        let segment = TranscriptSegment {
            id: self.next_id,
            text: trimmed.to_string(),
            start_time,
            span,
            word_timings,
        };
        self.next_id += 1;

        log::debug!(
            "セグメント確定: id={} [{:.3}s +{:.3}s] {}",
            segment.id,
            segment.start_time,
            segment.span,
            segment.text
        );

        self.segments.push(segment);
        self.partial_text.clear();
        self.last_finalized_text = Some(trimmed.to_string());
        self.state = SegmenterState::Listening;
        self.publish();
    }

    /// 確定結果の時刻範囲と単語タイミングを解決する
    ///
    /// 優先順位:
    /// 1. タイミング付きランがあれば整列器で単語単位に配分
    /// 2. 粗い確定タイムスタンプがあれば、単語数 × 単語あたり持続時間を
    ///    スパンとし、確定時点を発話の終端とみなして逆算
    /// 3. どちらも無ければ直前セグメントの終端（無ければ0）から
    ///    名目スパンを置く
    fn resolve_timing(
        &self,
        text: &str,
        runs: &[TimedRun],
        finalized_at: Option<f64>,
    ) -> (f64, f64, Vec<WordTiming>) {
        if let Some(aligned) = word_timing::align_runs(runs) {
            return (aligned.start_time, aligned.span, aligned.word_timings);
        }

        let word_count = text.split_whitespace().count().max(1);

        if let Some(at) = finalized_at {
            let span = word_count as f64 * self.span_per_word_secs;
            return ((at - span).max(0.0), span, Vec::new());
        }

        let start = self
            .segments
            .last()
            .map(|s| s.end_time())
            .unwrap_or(0.0);
        (start, self.nominal_span_secs, Vec::new())
    }

    /// ベースオフセットを更新
    ///
    /// 以降に確定するセグメントにのみ効く。確定済みセグメントを
    /// 遡って変更することはない。
    pub fn update_base_offset(&mut self, offset: f64) {
        log::debug!("ベースオフセットを更新: {:.3} -> {:.3}", self.base_offset, offset);
        self.base_offset = offset;
    }

    /// セッションを停止
    ///
    /// 冪等。2回目以降の呼び出しは何もしない。
    pub fn stop(&mut self) {
        if self.state == SegmenterState::Stopped {
            return;
        }
        self.state = SegmenterState::Stopped;
        log::info!(
            "セグメンテーションを停止しました (確定セグメント {} 件)",
            self.segments.len()
        );
        self.publish();
    }

    /// 現在の状態を取得
    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// 確定済みセグメント列を取得
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// 進行中の部分テキストを取得
    pub fn partial_text(&self) -> &str {
        &self.partial_text
    }

    /// セッション完了時の引き渡しペイロードを生成
    ///
    /// 全セグメントを半角スペース1つで連結した全文と、
    /// ISO 8601形式の作成タイムスタンプを付与する。
    pub fn into_transcript(self) -> SessionTranscript {
        let full_text = self
            .segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let now = SystemTime::now();
        let created_at = chrono::DateTime::from_timestamp(
            now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64,
            0,
        )
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default();

        SessionTranscript {
            created_at,
            segments: self.segments,
            full_text,
        }
    }

    /// 現在の状態をスナップショットとして発行
    fn publish(&self) {
        // 受信側がまだ居なくても最新値は保存しておく
        self.snapshot_tx.send_replace(TranscriptSnapshot {
            partial_text: self.partial_text.clone(),
            segments: self.segments.clone(),
            state: self.state,
        });
    }
}
