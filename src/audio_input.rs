use crate::config::AudioConfig;
use crate::session::CaptureFeed;
use crate::types::AudioFormat;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SizedSample};
use regex_lite::Regex;

/// オーディオデバイスからの音声入力
///
/// キャプチャデバイスはリアルタイムコールバックでバッファを届ける。
/// コールバック内の処理は `CaptureFeed::ingest` に委譲され、
/// I/Oや割り当ての重い処理、認識エンジン待ちは一切行わない。
pub struct AudioInput {
    device: cpal::Device,
    config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
    format: AudioFormat,
}

impl AudioInput {
    /// 新しいAudioInputを作成
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();

        log::info!("設定: {:?}", config);

        // デバイスを取得
        let device = if config.device_id == "default" {
            host.default_input_device()
                .context("デフォルト入力デバイスが見つかりません")?
        } else {
            // デバイスIDが指定されている場合は、デバイス一覧から検索
            Self::input_devices()?
                .into_iter()
                .find(|d| d.name().ok().as_deref() == Some(&config.device_id))
                .with_context(|| format!("デバイスが見つかりません: {}", config.device_id))?
        };

        log::info!("入力デバイス: {:?}", device.name());

        // デバイスの設定を取得
        let default_config = device
            .default_input_config()
            .context("デフォルト入力設定が取得できません")?;

        log::info!(
            "デバイス設定: {:?}, {}Hz, {}ch",
            default_config.sample_format(),
            default_config.sample_rate().0,
            default_config.channels()
        );

        // ストリーム設定を作成
        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(4096),
        };

        Ok(Self {
            device,
            config: stream_config,
            stream: None,
            format: AudioFormat {
                sample_rate: config.sample_rate,
                channels: config.channels,
            },
        })
    }

    /// このセッションのキャプチャフォーマットを取得
    ///
    /// セッション存続中は固定。`RecordingSession::capture_feed` に渡す。
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// ストリームを開始
    ///
    /// # Arguments
    /// * `feed` - リアルタイム取り込みハンドル。コールバックスレッドへ移動する
    pub fn start(&mut self, feed: CaptureFeed) -> Result<()> {
        // デバイスのデフォルトフォーマットを取得
        let default_config = self.device.default_input_config()?;

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(feed)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(feed)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(feed)?,
            cpal::SampleFormat::I32 => self.build_stream::<i32>(feed)?,
            _ => anyhow::bail!("サポートされていないサンプルフォーマット"),
        };

        stream.play().context("ストリームの再生開始に失敗")?;
        self.stream = Some(stream);

        log::info!("音声入力ストリームを開始しました");

        Ok(())
    }

    /// ストリームを構築
    fn build_stream<T>(&self, mut feed: CaptureFeed) -> Result<cpal::Stream>
    where
        T: SizedSample + Sample + Send + 'static,
        <T as Sample>::Float: Into<f32>,
    {
        // コールバックごとの再割り当てを避けるための作業バッファ
        let mut scratch: Vec<f32> = Vec::with_capacity(4096);

        let data_callback = move |data: &[T], _info: &cpal::InputCallbackInfo| {
            scratch.clear();
            for &sample in data {
                let f: f32 = sample.to_float_sample().into();
                scratch.push(f.clamp(-1.0, 1.0));
            }

            feed.ingest(&scratch);
        };

        let error_callback = move |err| {
            log::error!("ストリームエラー: {}", err);
        };

        let stream = self
            .device
            .build_input_stream(&self.config, data_callback, error_callback, None)
            .context("入力ストリームの構築に失敗")?;

        Ok(stream)
    }

    /// ストリームを停止
    ///
    /// ストリームと一緒に `CaptureFeed` もドロップされ、認識エンジンへの
    /// 音声フィードが閉じる。`RecordingSession::stop()` より先に呼ぶこと。
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::info!("音声入力ストリームを停止しました");
        }
    }

    /// デバイス一覧を表示
    pub fn list_devices() -> Result<()> {
        println!("利用可能な入力デバイス:");
        println!();

        for (idx, device) in Self::input_devices()?.into_iter().enumerate() {
            let name = device.name()?;
            println!("  [{}] {}", idx, name);

            device.supported_input_configs()?.for_each(|config_range| {
                println!(
                    "      フォーマット: {:?}, {}-{}Hz, {}ch",
                    config_range.sample_format(),
                    config_range.min_sample_rate().0,
                    config_range.max_sample_rate().0,
                    config_range.channels()
                );
            });
            println!();
        }

        Ok(())
    }

    /// MacBook Air 本体・WebCam など、通常入力デバイスとして利用してはいけないデバイスを除外したデバイス一覧を取得
    fn input_devices() -> Result<Vec<cpal::Device>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()?
            .filter(|device| {
                if let Ok(name) = device.name() {
                    // 除外するデバイス名のリスト
                    let excluded_names_regex = Regex::new("MacBook (Air|Pro)|AirPods|iPhone|Webcam|Background|Microsoft Teams|ZoomAudioDevice").unwrap();
                    if excluded_names_regex.is_match(&name) {
                        return false;
                    }
                    return true;
                } else {
                    true
                }
            })
            .collect();
        Ok(devices)
    }
}

impl Drop for AudioInput {
    fn drop(&mut self) {
        self.stop();
    }
}
