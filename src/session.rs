use crate::config::{Config, SegmenterConfig};
use crate::recognizer::RecognizerBackend;
use crate::ring_buffer::{rms_amplitude, AmplitudeRingBuffer};
use crate::sample_bridge::SampleBridge;
use crate::segmenter::SpeechSegmenter;
use crate::types::{
    AudioFormat, SampleI16, SessionTranscript, TranscribeError, TranscriptSnapshot,
};
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// セグメンテーションタスクへの制御コマンド
///
/// セグメンテーション状態の変更はすべて所有タスク経由で行う。
/// セッションオブジェクト側から直接触ることはない（単一ライター）。
enum SegmenterCommand {
    /// ベースオフセットを更新（以降の確定セグメントにのみ効く）
    SetBaseOffset(f64),
}

/// キャプチャコールバック用のリアルタイム取り込みハンドル
///
/// オーディオデバイスのコールバックスレッドに移動され、バッファごとに
/// `ingest` が呼ばれる。コールバックはリアルタイム制約下にあるため、
/// ここで行うのは以下の有界な処理のみ:
///
/// 1. バッファのRMS振幅をリングバッファへ push（競合時はスキップ、
///    ブロックしない）
/// 2. サンプルブリッジでの変換
/// 3. 変換済みバッファの認識エンジンへの非同期送信
///    （fire-and-forget、コールバック内で待たない）
pub struct CaptureFeed {
    bridge: Option<SampleBridge>,
    amplitude: Arc<Mutex<AmplitudeRingBuffer>>,
    audio_tx: Option<mpsc::Sender<Vec<SampleI16>>>,
}

impl CaptureFeed {
    /// インターリーブ済みf32バッファを1つ取り込む
    pub fn ingest(&mut self, interleaved: &[f32]) {
        // 振幅は認識の成否に関係なく常に更新する
        let amplitude = rms_amplitude(interleaved);
        if let Ok(mut ring) = self.amplitude.try_lock() {
            ring.push(amplitude);
        }
        // 競合時はこのバッファの振幅を落とす（描画側が読んでいる最中）

        let mut feed_closed = false;
        if let (Some(bridge), Some(tx)) = (self.bridge.as_mut(), self.audio_tx.as_ref()) {
            let converted = bridge.convert(interleaved);
            if !converted.is_empty() {
                match tx.try_send(converted) {
                    Ok(_) => {
                        // 成功時はログ出力しない（パフォーマンス重視）
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        log::warn!("認識エンジンへの送信失敗: バッファ満杯");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        log::debug!("認識エンジンへの送信失敗: チャンネルクローズ");
                        feed_closed = true;
                    }
                }
            }
        }
        if feed_closed {
            self.audio_tx = None;
        }
    }

    /// 認識エンジンへのフィードが有効かどうか
    pub fn is_feeding_recognizer(&self) -> bool {
        self.bridge.is_some() && self.audio_tx.is_some()
    }
}

/// 1回の録音セッションの文字起こしパイプライン
///
/// 認識バックエンド・セグメンテーションタスク・キャプチャフィードを
/// 束ね、セッションの開始/停止ライフサイクルを管理する。
///
/// 振幅リングバッファは可視化側から共有で渡される。セッションの
/// 開始はセグメンテーション状態を完全にリセットするが、リングバッファの
/// 内容はクリアしない（波形はセッションをまたいで連続する）。
///
/// 認識関連の失敗はすべてこのサブシステム内に閉じる。文字起こしなしの
/// 録音は常に許容される縮退モードであり、エラーが録音自体を
/// 中断させることはない。
pub struct RecordingSession {
    recognizer_format: AudioFormat,
    segmenter_config: SegmenterConfig,
    amplitude: Arc<Mutex<AmplitudeRingBuffer>>,
    audio_tx: Option<mpsc::Sender<Vec<SampleI16>>>,
    command_tx: Option<mpsc::UnboundedSender<SegmenterCommand>>,
    snapshot_rx: Option<watch::Receiver<TranscriptSnapshot>>,
    consumer: Option<JoinHandle<SpeechSegmenter>>,
}

impl RecordingSession {
    pub fn new(config: &Config, amplitude: Arc<Mutex<AmplitudeRingBuffer>>) -> Self {
        Self {
            recognizer_format: AudioFormat {
                sample_rate: config.recognizer.sample_rate,
                channels: 1,
            },
            segmenter_config: config.segmenter.clone(),
            amplitude,
            audio_tx: None,
            command_tx: None,
            snapshot_rx: None,
            consumer: None,
        }
    }

    /// 文字起こしを開始
    ///
    /// バックエンドのイベントストリームを開き、セグメンテーション状態を
    /// 所有する単一の消費タスクを起動する。
    ///
    /// # Errors
    ///
    /// `NotAuthorized` / `EngineUnavailable` はそのまま呼び出し側へ
    /// 返す。エラー時もセッションオブジェクトは文字起こしなしの録音用に
    /// そのまま使える（`capture_feed` は振幅のみのフィードを返す）。
    pub async fn start(
        &mut self,
        backend: &mut dyn RecognizerBackend,
    ) -> Result<(), TranscribeError> {
        let (audio_tx, mut event_rx) = match backend.start_stream().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("文字起こしを開始できません: {} (録音は継続可能)", e);
                return Err(e);
            }
        };

        let mut segmenter = SpeechSegmenter::new(&self.segmenter_config);
        segmenter.start();
        self.snapshot_rx = Some(segmenter.subscribe());

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<SegmenterCommand>();

        // このタスクだけがセグメンテーション状態を変更する
        let consumer = tokio::spawn(async move {
            let mut commands_open = true;
            loop {
                tokio::select! {
                    event = event_rx.recv() => {
                        match event {
                            Some(event) => segmenter.handle_event(event),
                            None => break, // ストリーム終了
                        }
                    }
                    command = command_rx.recv(), if commands_open => {
                        match command {
                            Some(SegmenterCommand::SetBaseOffset(offset)) => {
                                segmenter.update_base_offset(offset);
                            }
                            None => commands_open = false,
                        }
                    }
                }
            }
            segmenter
        });

        self.audio_tx = Some(audio_tx);
        self.command_tx = Some(command_tx);
        self.consumer = Some(consumer);

        log::info!("文字起こしセッションを開始しました");
        Ok(())
    }

    /// キャプチャコールバックへ渡す取り込みハンドルを作成
    ///
    /// 変換器の構築に失敗した場合（`ConversionUnavailable`）は警告を
    /// 出して振幅のみのフィードを返す。録音は継続する。
    pub fn capture_feed(&self, source: AudioFormat) -> CaptureFeed {
        let bridge = if self.audio_tx.is_some() {
            match SampleBridge::new(source, self.recognizer_format) {
                Ok(bridge) => Some(bridge),
                Err(e) => {
                    log::warn!("{} - 文字起こしなしで録音を継続します", e);
                    None
                }
            }
        } else {
            None
        };

        let audio_tx = if bridge.is_some() {
            self.audio_tx.clone()
        } else {
            None
        };

        CaptureFeed {
            bridge,
            amplitude: self.amplitude.clone(),
            audio_tx,
        }
    }

    /// ベースオフセットを更新
    ///
    /// 一時停止からの再開時に呼び、以降に確定するセグメントの
    /// タイムスタンプを連続に保つ。確定済みセグメントには影響しない。
    pub fn update_base_offset(&self, offset: f64) {
        if let Some(tx) = &self.command_tx {
            if tx.send(SegmenterCommand::SetBaseOffset(offset)).is_err() {
                log::warn!("ベースオフセット更新に失敗: セグメンテーションタスク終了済み");
            }
        }
    }

    /// 最新のトランスクリプトスナップショットを取得
    ///
    /// 文字起こしが動いていない場合はデフォルト（空）を返す。
    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.snapshot_rx
            .as_ref()
            .map(|rx| rx.borrow().clone())
            .unwrap_or_default()
    }

    /// スナップショットの受信側を取得（描画ティック用）
    pub fn subscribe(&self) -> Option<watch::Receiver<TranscriptSnapshot>> {
        self.snapshot_rx.as_ref().map(|rx| rx.clone())
    }

    /// 波形描画用の振幅スナップショットを取得
    pub fn waveform(&self, count: usize) -> Vec<f32> {
        self.amplitude.lock().unwrap().snapshot(count)
    }

    /// 文字起こしが動作中かどうか
    pub fn is_transcribing(&self) -> bool {
        self.consumer.is_some()
    }

    /// セッションを停止し、引き渡しペイロードを返す
    ///
    /// 順序が重要: まず音声フィードを閉じることで「入力終了まで
    /// 確定処理せよ」をバックエンドへ通知し、イベントストリームが
    /// 閉じるのを待ってからセグメンテーション状態を回収する。
    /// チャンネルに残っているバッファ済み音声は閉鎖後も受信されるため
    /// 孤立しない。
    ///
    /// 呼び出し側はこの前にキャプチャ（`AudioInput::stop()`）を止めて、
    /// `CaptureFeed` をドロップしておくこと。
    ///
    /// 冪等。文字起こしなしのセッションや2回目以降の呼び出しは
    /// `Ok(None)` を返す。
    pub async fn stop(&mut self) -> Result<Option<SessionTranscript>> {
        self.audio_tx = None;
        self.command_tx = None;

        let handle = match self.consumer.take() {
            Some(handle) => handle,
            None => return Ok(None),
        };

        let mut segmenter = handle
            .await
            .context("セグメンテーションタスクの終了待ちに失敗")?;
        segmenter.stop();

        let transcript = segmenter.into_transcript();
        log::info!(
            "文字起こしセッションを終了しました (セグメント {} 件)",
            transcript.segments.len()
        );
        Ok(Some(transcript))
    }
}
