//! memo-transcribe - ボイスメモ録音のためのライブ音声セグメンテーションエンジン
//!
//! このクレートは、録音中の生オーディオサンプルと音声認識エンジンからの
//! 非同期イベント列を受け取り、タイムスタンプ付きの確定セグメント列と
//! 単語単位のサブタイミングを生成するライブラリを提供します。
//!
//! # 主な機能
//!
//! - **サンプルブリッジ**: 任意のデバイスフォーマットを認識エンジン向けの
//!   固定フォーマット (モノラル 16kHz i16) に変換
//! - **振幅リングバッファ**: 波形描画用の固定容量振幅履歴
//! - **セグメンテーション状態機械**: 部分/確定イベントの分類、重複排除、
//!   時刻の単調性保証
//! - **単語タイミング整列**: タイミング付きランから単語単位のタイミングを
//!   比例配分で算出
//! - **リビール同期**: 再生/録音経過時刻に同期した文字単位の不透明度計算
//!
//! # アーキテクチャ
//!
//! ```text
//! [Audio Device] → [AudioInput] → [CaptureFeed]
//!                                      │
//!                               ┌──────┴──────┐
//!                               │             │
//!                        [SampleBridge] [AmplitudeRingBuffer]
//!                               │             │
//!                               ↓             ↓
//!                      [RecognizerBackend] [Waveform]
//!                               │
//!                               ↓
//!                      [SpeechSegmenter] → [TranscriptSnapshot]
//!                               │                 │
//!                               ↓                 ↓
//!                      [WordTimingAligner]   [Reveal]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use memo_transcribe::config::Config;
//!
//! // 設定ファイルを読み込み
//! let config = Config::load_or_default("config.toml").unwrap();
//!
//! // またはデフォルト設定を生成
//! Config::write_default("config.toml").unwrap();
//! ```
//!
//! セッションの停止順序には意味があります。先に `AudioInput::stop()` で
//! キャプチャを止めてから `RecordingSession::stop()` を呼ぶことで、
//! バッファ済みの音声が認識エンジンで最後まで確定処理されます。

pub mod audio_input;
pub mod config;
pub mod recognizer;
pub mod reveal;
pub mod ring_buffer;
pub mod sample_bridge;
pub mod segmenter;
pub mod session;
pub mod types;
pub mod word_timing;
