use serde::{Deserialize, Serialize};

/// 16ビット整数型のオーディオサンプル
///
/// 認識エンジンに送信するPCM音声データを表現するための型エイリアス。
/// -32768 から 32767 の範囲の値を取る。
pub type SampleI16 = i16;

/// オーディオフォーマット情報
///
/// 音声データのサンプリングレートとチャンネル数を保持する。
///
/// # Examples
///
/// ```
/// # use memo_transcribe::types::AudioFormat;
/// let format = AudioFormat {
///     sample_rate: 48000,  // 48kHz
///     channels: 2,          // ステレオ
/// };
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    /// サンプリングレート (Hz)
    ///
    /// 典型的な値: 8000, 16000, 44100, 48000
    pub sample_rate: u32,

    /// チャンネル数
    ///
    /// 1: モノラル, 2: ステレオ
    pub channels: u16,
}

/// 単語単位のタイミング
///
/// オフセットは所属セグメントの開始時刻からの相対値（秒）。
/// 絶対時刻は保持しない。
///
/// 比例配分による推定のため、隣接する単語のタイミングが
/// わずかに重なることは許容される。オフセット自体は
/// 単調非減少であることが保証される。
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WordTiming {
    /// 単語のテキスト
    pub word: String,

    /// セグメント開始からのオフセット（秒）。常に 0 以上
    pub start_offset: f64,

    /// 単語の持続時間（秒）
    pub span: f64,
}

/// 確定済みトランスクリプトセグメント
///
/// 認識エンジンが確定結果を報告したときにのみ生成され、
/// 確定列に追加された後は不変。編集も並べ替えも行われず、
/// 追記のみが許される。
///
/// # 不変条件
///
/// - `start_time >= 0`
/// - 先に追加されたセグメント `a` と後のセグメント `b` について
///   `b.start_time >= a.start_time + a.span`（重複なし・単調）
/// - `text` は空でなくトリム済み
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TranscriptSegment {
    /// セグメントID（セッション内で一意）
    pub id: u64,

    /// 確定テキスト（トリム済み・非空）
    pub text: String,

    /// ストリーム開始からの絶対開始時刻（秒）
    pub start_time: f64,

    /// セグメントの持続時間（秒）
    pub span: f64,

    /// 単語単位のタイミング
    ///
    /// 認識エンジンがタイミング属性を供給しなかった場合は空。
    /// 空のセグメントは描画側で静的テキストとして表示される。
    pub word_timings: Vec<WordTiming>,
}

impl TranscriptSegment {
    /// セグメントの終了時刻（秒）
    pub fn end_time(&self) -> f64 {
        self.start_time + self.span
    }
}

/// タイミング付きラン
///
/// 認識エンジンが確定結果に付与する、単一のタイミング属性を持つ
/// 連続したテキスト範囲。`start` はエンジンのクロックにおける
/// 絶対開始時刻（秒）。
#[derive(Clone, Debug, PartialEq)]
pub struct TimedRun {
    /// このランがカバーするテキスト
    pub text: String,

    /// 絶対開始時刻（秒）
    pub start: f64,

    /// 持続時間（秒）
    pub duration: f64,
}

/// 音声認識エンジンからのイベント
///
/// 認識エンジンは部分結果と確定結果を順不同の非同期イベント列として
/// 報告する。部分結果には順序の不変条件は適用されない。
#[derive(Clone, Debug)]
pub enum RecognitionEvent {
    /// 部分結果（進行中の発話の現時点での推定テキスト）
    Partial {
        /// 現時点の推定テキスト。毎回丸ごと置き換える
        text: String,
    },

    /// 確定結果
    Final {
        /// 確定テキスト
        text: String,

        /// タイミング付きラン（供給されない場合は空）
        runs: Vec<TimedRun>,

        /// 確定時点の粗いタイムスタンプ（秒、エンジンクロック）
        ///
        /// ランが無い場合のフォールバック推定に使用する
        finalized_at: Option<f64>,
    },

    /// ストリームエラー
    ///
    /// 文字起こしは停止するが、確定済みセグメントは有効なまま残る
    Error {
        /// エラー内容
        message: String,
    },
}

/// セグメンテーション状態機械の状態
///
/// `Idle → Listening → (発話ごとに) Accumulating ⇄ Listening` と遷移し、
/// ストリーム終了・エラー・明示的な停止で `Stopped` に到達する。
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SegmenterState {
    /// セッション開始前
    #[default]
    Idle,
    /// イベント待ち
    Listening,
    /// 発話進行中（部分結果を受信済み）
    Accumulating,
    /// 終了（ストリーム終了・エラー・停止）
    Stopped,
}

/// 公開用トランスクリプトスナップショット
///
/// セグメンテーション状態機械の単一ライタータスクが発行する不変の
/// スナップショット。描画側や永続化側はこれを読むだけで、
/// 共有可変参照は一切持たない。
#[derive(Clone, Debug, Default)]
pub struct TranscriptSnapshot {
    /// 進行中の（未確定の）発話テキスト
    ///
    /// 部分更新のたびに丸ごと置き換えられ、確定と同時にクリアされる
    pub partial_text: String,

    /// 確定済みセグメント列（追記のみ・時刻単調）
    pub segments: Vec<TranscriptSegment>,

    /// 状態機械の現在の状態
    pub state: SegmenterState,
}

/// セッション完了時の引き渡しペイロード
///
/// 永続化層へ渡す不透明なデータ。このクレート自身は
/// ストレージへの書き込みを行わない。
///
/// # JSON出力例
///
/// ```json
/// {
///   "created_at": "2025-01-02T14:30:15+00:00",
///   "segments": [
///     { "id": 0, "text": "こんにちは", "start_time": 0.0, "span": 1.2, "word_timings": [] }
///   ],
///   "full_text": "こんにちは"
/// }
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SessionTranscript {
    /// ISO 8601形式の作成タイムスタンプ
    pub created_at: String,

    /// 確定済みセグメント列
    pub segments: Vec<TranscriptSegment>,

    /// 全セグメントを半角スペース1つで連結した全文
    pub full_text: String,
}

/// 文字起こしサブシステムのエラー
///
/// いずれのエラーも録音パイプラインには影響しない。
/// 文字起こしなしの録音は常に許容される縮退モードである。
#[derive(Debug, thiserror::Error)]
pub enum TranscribeError {
    /// 音声認識の利用が許可されていない（セッションに対して終端的）
    #[error("音声認識の利用が許可されていません")]
    NotAuthorized,

    /// 認識エンジンを構築できなかった（文字起こしをスキップして録音継続）
    #[error("音声認識エンジンを初期化できません: {0}")]
    EngineUnavailable(String),

    /// フォーマット変換器を構築できなかった（文字起こしをスキップして録音継続）
    #[error("フォーマット変換器を構築できません: {0}")]
    ConversionUnavailable(String),

    /// セッション途中でエンジンがエラーを報告した
    #[error("認識ストリームエラー: {0}")]
    Stream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_creation() {
        let format = AudioFormat {
            sample_rate: 48000,
            channels: 2,
        };
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.channels, 2);
    }

    #[test]
    fn test_segment_end_time() {
        let segment = TranscriptSegment {
            id: 0,
            text: "こんにちは".to_string(),
            start_time: 2.0,
            span: 1.5,
            word_timings: Vec::new(),
        };
        assert!((segment.end_time() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_segment_json_serialization() {
        let segment = TranscriptSegment {
            id: 3,
            text: "テスト".to_string(),
            start_time: 1.0,
            span: 0.5,
            word_timings: vec![WordTiming {
                word: "テスト".to_string(),
                start_offset: 0.0,
                span: 0.5,
            }],
        };

        let json = serde_json::to_string(&segment).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["id"], 3);
        assert_eq!(parsed["text"], "テスト");
        assert_eq!(parsed["word_timings"][0]["word"], "テスト");
    }

    #[test]
    fn test_snapshot_default() {
        let snapshot = TranscriptSnapshot::default();
        assert_eq!(snapshot.state, SegmenterState::Idle);
        assert!(snapshot.partial_text.is_empty());
        assert!(snapshot.segments.is_empty());
    }

    #[test]
    fn test_segmenter_state_serialization() {
        let json = serde_json::to_string(&SegmenterState::Listening).unwrap();
        assert_eq!(json, r#""listening""#);
    }

    #[test]
    fn test_error_is_nonfatal_text() {
        // エラーメッセージに縮退モードの説明が含まれることまでは求めない。
        // Display 実装が機能していることのみ確認する。
        let err = TranscribeError::EngineUnavailable("テスト".to_string());
        assert!(err.to_string().contains("テスト"));
    }
}
