use crate::types::{RecognitionEvent, SampleI16, TranscribeError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// 音声認識バックエンドの共通トレイト
///
/// 認識エンジンは不透明な外部コンポーネントとして扱う。
/// 開始・音声供給・イベント列の受信のみがこのクレートの関心事で、
/// 音響モデルやデコーダの内部には立ち入らない。
#[async_trait]
pub trait RecognizerBackend: Send {
    /// ストリーミング認識セッションを開始
    ///
    /// # Returns
    ///
    /// (送信チャンネル, 受信チャンネル) のタプル
    /// - 送信チャンネル: 変換済みPCM音声データ（i16サンプル）を送信
    /// - 受信チャンネル: 認識イベント（部分/確定/エラー）を受信
    ///
    /// 送信チャンネルを全てドロップすることが「入力終了まで確定処理して
    /// 終了せよ」という明示的なシグナルになる。バックエンドは
    /// チャンネルに残っているバッファ済み音声を処理し切ってから
    /// イベントストリームを閉じること。
    ///
    /// # Errors
    ///
    /// - `NotAuthorized` - 認識機能の利用が許可されていない
    /// - `EngineUnavailable` - エンジンを構築できなかった
    async fn start_stream(
        &mut self,
    ) -> Result<(mpsc::Sender<Vec<SampleI16>>, mpsc::Receiver<RecognitionEvent>), TranscribeError>;
}

/// 固定のイベント列を再生するバックエンド
///
/// プラットフォームの認識エンジンなしで配線を検証するために使う。
/// 音声入力を消費し尽くした後（= 送信側が全てドロップされた後）に
/// イベント列を順番に送出するので、セッションの終了処理が
/// 「入力終了 → 残りの確定 → ストリーム終了」の順で観測できる。
pub struct ScriptedBackend {
    events: Vec<RecognitionEvent>,
    failure: Option<TranscribeError>,
}

impl ScriptedBackend {
    /// 指定したイベント列を再生するバックエンドを作成
    pub fn new(events: Vec<RecognitionEvent>) -> Self {
        Self {
            events,
            failure: None,
        }
    }

    /// 開始時に必ず失敗するバックエンドを作成
    ///
    /// 認可エラーやエンジン構築失敗の縮退パスのテストに使う。
    pub fn failing(error: TranscribeError) -> Self {
        Self {
            events: Vec::new(),
            failure: Some(error),
        }
    }
}

#[async_trait]
impl RecognizerBackend for ScriptedBackend {
    async fn start_stream(
        &mut self,
    ) -> Result<(mpsc::Sender<Vec<SampleI16>>, mpsc::Receiver<RecognitionEvent>), TranscribeError>
    {
        if let Some(error) = self.failure.take() {
            return Err(error);
        }

        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<SampleI16>>(4096);
        let (event_tx, event_rx) = mpsc::channel::<RecognitionEvent>(32);

        let events = std::mem::take(&mut self.events);

        tokio::spawn(async move {
            // 音声入力を消費し尽くす。送信側が閉じてもチャンネルに
            // 残っているバッファは全て受信されるので、入力は孤立しない
            let mut total_samples = 0usize;
            while let Some(samples) = audio_rx.recv().await {
                total_samples += samples.len();
            }
            log::debug!(
                "ScriptedBackend: 入力終了 ({} サンプル受信)、イベント再生開始",
                total_samples
            );

            for event in events {
                if event_tx.send(event).await.is_err() {
                    // 受信側が先に閉じた
                    break;
                }
            }
        });

        Ok((audio_tx, event_rx))
    }
}
