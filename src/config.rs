use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub visualizer: VisualizerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// オーディオ入力設定
///
/// オーディオデバイスからの入力に関する設定。
///
/// # デフォルト値
///
/// - `device_id`: "default" (システムのデフォルトデバイス)
/// - `sample_rate`: 48000 Hz (モバイル機器の一般的なキャプチャレート)
/// - `channels`: 1 (モノラル)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default = "default_capture_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_capture_channels")]
    pub channels: u16,
}

/// 音声認識エンジン設定
///
/// 認識エンジンに供給する音声フォーマットとロケール。
///
/// # デフォルト値
///
/// - `sample_rate`: 16000 Hz (音声認識エンジンの一般的な要求値)
/// - `locale`: "ja-JP" (日本語)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognizerConfig {
    #[serde(default = "default_recognizer_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_locale")]
    pub locale: String,
}

/// セグメンテーション設定
///
/// タイミング情報が得られない確定結果のフォールバック推定に使う定数。
///
/// # デフォルト値
///
/// - `nominal_span_secs`: 1.0 秒 (情報が全く無い場合の名目持続時間)
/// - `span_per_word_secs`: 0.3 秒 (テキスト長のみ既知の場合の単語あたり持続時間)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmenterConfig {
    #[serde(default = "default_nominal_span_secs")]
    pub nominal_span_secs: f64,
    #[serde(default = "default_span_per_word_secs")]
    pub span_per_word_secs: f64,
}

/// 波形可視化設定
///
/// # デフォルト値
///
/// - `capacity`: 256 サンプル (リングバッファの容量)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VisualizerConfig {
    #[serde(default = "default_ring_capacity")]
    pub capacity: usize,
}

/// 出力設定
///
/// # デフォルト値
///
/// - `log_level`: "info"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default functions
fn default_device_id() -> String {
    "default".to_string()
}

fn default_capture_sample_rate() -> u32 {
    48000
}

fn default_capture_channels() -> u16 {
    1
}

fn default_recognizer_sample_rate() -> u32 {
    16000
}

fn default_locale() -> String {
    "ja-JP".to_string()
}

fn default_nominal_span_secs() -> f64 {
    1.0
}

fn default_span_per_word_secs() -> f64 {
    0.3
}

fn default_ring_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            recognizer: RecognizerConfig::default(),
            segmenter: SegmenterConfig::default(),
            visualizer: VisualizerConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_id: default_device_id(),
            sample_rate: default_capture_sample_rate(),
            channels: default_capture_channels(),
        }
    }
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_recognizer_sample_rate(),
            locale: default_locale(),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            nominal_span_secs: default_nominal_span_secs(),
            span_per_word_secs: default_span_per_word_secs(),
        }
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            capacity: default_ring_capacity(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Arguments
    ///
    /// * `path` - 設定ファイルのパス
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use memo_transcribe::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// デフォルト値を持つ設定ファイルを生成する。
    /// 既存のファイルは上書きされる。
    ///
    /// # Arguments
    ///
    /// * `path` - 出力先のパス
    ///
    /// # Errors
    ///
    /// ファイルの書き込みに失敗した場合にエラーを返す。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// 設定ファイルの存在を確認し、存在する場合は読み込み、
    /// 存在しない場合はデフォルト設定を返す。
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.recognizer.sample_rate, 16000);
        assert_eq!(config.recognizer.locale, "ja-JP");
        assert_eq!(config.segmenter.nominal_span_secs, 1.0);
        assert_eq!(config.segmenter.span_per_word_secs, 0.3);
        assert_eq!(config.visualizer.capacity, 256);
        assert_eq!(config.output.log_level, "info");
    }

    #[test]
    fn test_write_and_read_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        // デフォルト設定を書き込み
        Config::write_default(path).unwrap();

        // 読み込み
        let config = Config::from_file(path).unwrap();
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.recognizer.locale, "ja-JP");
    }

    #[test]
    fn test_custom_config() {
        let toml_content = r#"
[audio]
device_id = "test-device"
sample_rate = 44100
channels = 2

[recognizer]
sample_rate = 16000
locale = "en-US"

[segmenter]
nominal_span_secs = 0.8
span_per_word_secs = 0.25

[visualizer]
capacity = 512

[output]
log_level = "debug"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.audio.device_id, "test-device");
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.recognizer.locale, "en-US");
        assert_eq!(config.segmenter.nominal_span_secs, 0.8);
        assert_eq!(config.segmenter.span_per_word_secs, 0.25);
        assert_eq!(config.visualizer.capacity, 512);
        assert_eq!(config.output.log_level, "debug");
    }

    #[test]
    fn test_load_or_default_nonexistent() {
        let config = Config::load_or_default("nonexistent_file.toml").unwrap();
        // デフォルト設定が返されることを確認
        assert_eq!(config.audio.sample_rate, 48000);
    }

    #[test]
    fn test_partial_config() {
        // 一部の設定のみ記述した場合、残りはデフォルト値が使われる
        let toml_content = r#"
[audio]
sample_rate = 44100
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        // 指定した値
        assert_eq!(config.audio.sample_rate, 44100);

        // デフォルト値
        assert_eq!(config.audio.device_id, "default");
        assert_eq!(config.recognizer.sample_rate, 16000);
        assert_eq!(config.visualizer.capacity, 256);
    }
}
