use crate::types::{AudioFormat, SampleI16, TranscribeError};

/// キャプチャフォーマットから認識エンジン向けフォーマットへの変換器
///
/// 可変フォーマットの入力バッファ（任意のサンプリングレート・
/// チャンネル数）を、認識エンジンが要求する単一の固定フォーマット
/// （モノラル i16）へ変換する。
///
/// ソースフォーマットは1録音セッションの間固定される。
/// リサンプリングは線形補間で行い、チャンク境界をまたぐ補間のために
/// 端数読み出し位置と直前サンプルを呼び出しをまたいで保持する。
///
/// リアルタイムのキャプチャコールバックから呼ばれるため、
/// 出力Vec以外の割り当てを行わず、ブロックもしない。
#[derive(Debug)]
pub struct SampleBridge {
    source: AudioFormat,
    target: AudioFormat,
    /// 次の出力サンプルの読み出し位置（ソースサンプル単位の端数）
    resample_pos: f64,
    /// 直前チャンクの最終サンプル（境界をまたぐ補間用）
    carry: Option<f32>,
}

impl SampleBridge {
    /// 新しい変換器を作成
    ///
    /// # Errors
    ///
    /// (ソース, ターゲット) の組に対する変換器を構築できない場合は
    /// `ConversionUnavailable` を返す。呼び出し側はライブ文字起こしなしの
    /// 録音にフォールバックする（録音は継続する）。
    pub fn new(source: AudioFormat, target: AudioFormat) -> Result<Self, TranscribeError> {
        if source.sample_rate == 0 || target.sample_rate == 0 {
            return Err(TranscribeError::ConversionUnavailable(format!(
                "サンプリングレートが不正: {} Hz -> {} Hz",
                source.sample_rate, target.sample_rate
            )));
        }
        if source.channels == 0 {
            return Err(TranscribeError::ConversionUnavailable(
                "ソースのチャンネル数が0".to_string(),
            ));
        }
        if target.channels != 1 {
            // 認識エンジンはモノラルのみ受け付ける
            return Err(TranscribeError::ConversionUnavailable(format!(
                "ターゲットはモノラルのみ対応: {} ch が指定された",
                target.channels
            )));
        }

        Ok(Self {
            source,
            target,
            resample_pos: 0.0,
            carry: None,
        })
    }

    /// ソースフォーマットを取得
    pub fn source_format(&self) -> AudioFormat {
        self.source
    }

    /// ターゲットフォーマットを取得
    pub fn target_format(&self) -> AudioFormat {
        self.target
    }

    /// インターリーブ済みf32バッファをターゲットフォーマットのi16列へ変換
    ///
    /// # Arguments
    ///
    /// * `interleaved` - ソースフォーマットのインターリーブ済みサンプル
    ///   (-1.0 ~ 1.0)
    ///
    /// # Returns
    ///
    /// ターゲットレートのモノラルi16サンプル列。出力容量は
    /// `ceil(入力フレーム数 × ターゲットレート / ソースレート)` で確保される。
    pub fn convert(&mut self, interleaved: &[f32]) -> Vec<SampleI16> {
        let channels = self.source.channels as usize;
        let frames = interleaved.len() / channels;
        if frames == 0 {
            return Vec::new();
        }

        // 同一レートのモノラル入力はそのまま量子化する
        if self.source.sample_rate == self.target.sample_rate && channels == 1 {
            return interleaved.iter().map(|&s| to_i16(s)).collect();
        }

        // 各フレームの全チャンネルを平均してモノラルへ
        let mut mono = Vec::with_capacity(frames + 1);
        if let Some(c) = self.carry {
            mono.push(c);
        }
        for frame in 0..frames {
            let base = frame * channels;
            let sum: f32 = interleaved[base..base + channels].iter().sum();
            mono.push(sum / channels as f32);
        }

        // 線形補間によるリサンプリング
        let step = self.source.sample_rate as f64 / self.target.sample_rate as f64;
        let capacity = (frames as f64 * self.target.sample_rate as f64
            / self.source.sample_rate as f64)
            .ceil() as usize;
        let mut out = Vec::with_capacity(capacity);

        let mut pos = self.resample_pos;
        loop {
            let idx = pos.floor() as usize;
            if idx + 1 >= mono.len() {
                break;
            }
            let frac = pos - idx as f64;
            let sample =
                mono[idx] as f64 * (1.0 - frac) + mono[idx + 1] as f64 * frac;
            out.push(to_i16(sample as f32));
            pos += step;
        }

        // 最終サンプルを次チャンクの先頭位置として繰り越す
        self.carry = mono.last().copied();
        self.resample_pos = pos - (mono.len() - 1) as f64;

        out
    }

    /// 繰り越し状態をクリア
    pub fn reset(&mut self) {
        self.resample_pos = 0.0;
        self.carry = None;
    }
}

/// f32サンプルをクランプしてi16へ量子化
fn to_i16(sample: f32) -> SampleI16 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(sample_rate: u32, channels: u16) -> AudioFormat {
        AudioFormat {
            sample_rate,
            channels,
        }
    }

    #[test]
    fn test_invalid_formats_rejected() {
        let err = SampleBridge::new(format(0, 1), format(16000, 1)).unwrap_err();
        assert!(matches!(err, TranscribeError::ConversionUnavailable(_)));

        let err = SampleBridge::new(format(48000, 0), format(16000, 1)).unwrap_err();
        assert!(matches!(err, TranscribeError::ConversionUnavailable(_)));

        let err = SampleBridge::new(format(48000, 1), format(16000, 2)).unwrap_err();
        assert!(matches!(err, TranscribeError::ConversionUnavailable(_)));
    }

    #[test]
    fn test_passthrough_same_format() {
        let mut bridge = SampleBridge::new(format(16000, 1), format(16000, 1)).unwrap();

        let input = vec![0.0f32, 0.5, -0.5, 1.0];
        let output = bridge.convert(&input);

        assert_eq!(output.len(), 4);
        assert_eq!(output[0], 0);
        assert_eq!(output[1], (0.5 * i16::MAX as f32) as i16);
        assert_eq!(output[3], i16::MAX);
    }

    #[test]
    fn test_clamping() {
        let mut bridge = SampleBridge::new(format(16000, 1), format(16000, 1)).unwrap();

        // 範囲外のサンプルはクランプされる
        let output = bridge.convert(&[2.0, -2.0]);
        assert_eq!(output[0], i16::MAX);
        assert_eq!(output[1], (-1.0 * i16::MAX as f32) as i16);
    }

    #[test]
    fn test_stereo_downmix() {
        let mut bridge = SampleBridge::new(format(16000, 2), format(16000, 1)).unwrap();

        // 左0.4 / 右0.8 → 平均0.6
        let input = vec![0.4f32, 0.8, 0.4, 0.8, 0.4, 0.8, 0.4, 0.8];
        let output = bridge.convert(&input);

        assert!(!output.is_empty());
        let expected = (0.6f32 * i16::MAX as f32) as i16;
        for sample in &output {
            assert!((sample - expected).abs() <= 1);
        }
    }

    #[test]
    fn test_downsample_length() {
        let mut bridge = SampleBridge::new(format(48000, 1), format(16000, 1)).unwrap();

        // 4800フレーム (100ms @ 48kHz) → 約1600サンプル (100ms @ 16kHz)
        let input = vec![0.1f32; 4800];
        let output = bridge.convert(&input);

        let expected = 1600usize;
        assert!(
            output.len().abs_diff(expected) <= 1,
            "出力長 {} が期待値 {} から乖離",
            output.len(),
            expected
        );
    }

    #[test]
    fn test_resample_continuity_across_calls() {
        let mut bridge = SampleBridge::new(format(48000, 1), format(16000, 1)).unwrap();

        // 2チャンクに分割して変換しても合計長はほぼ同じ
        let chunk = vec![0.2f32; 2400];
        let first = bridge.convert(&chunk);
        let second = bridge.convert(&chunk);

        let total = first.len() + second.len();
        assert!(
            total.abs_diff(1600) <= 2,
            "合計出力長 {} が期待値 1600 から乖離",
            total
        );
    }

    #[test]
    fn test_empty_input() {
        let mut bridge = SampleBridge::new(format(48000, 2), format(16000, 1)).unwrap();
        assert!(bridge.convert(&[]).is_empty());
    }

    #[test]
    fn test_reset() {
        let mut bridge = SampleBridge::new(format(48000, 1), format(16000, 1)).unwrap();

        let _ = bridge.convert(&vec![0.3f32; 1000]);
        bridge.reset();

        // リセット後は新しいセッションとして先頭から変換される
        let output = bridge.convert(&vec![0.3f32; 4800]);
        assert!(output.len().abs_diff(1600) <= 1);
    }
}
