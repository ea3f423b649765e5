use std::collections::VecDeque;

/// リングバッファの容量の下限
pub const MIN_CAPACITY: usize = 8;

/// 波形可視化用の振幅リングバッファ
///
/// スカラー振幅サンプルの固定容量の循環履歴を保持する。
/// 論理的には、上限のない振幅ストリームに対するスライディング
/// ウィンドウとして振る舞う。認識処理からは独立しており、
/// 内容はセッションをまたいで保持される（可視化はセッション間で連続）。
///
/// # Examples
///
/// ```
/// # use memo_transcribe::ring_buffer::AmplitudeRingBuffer;
/// let mut ring = AmplitudeRingBuffer::new(16);
/// for i in 0..20 {
///     ring.push(i as f32);
/// }
/// // 容量を超えた分は最古から上書きされる
/// let snapshot = ring.snapshot(16);
/// assert_eq!(snapshot.first(), Some(&4.0));
/// assert_eq!(snapshot.last(), Some(&19.0));
/// ```
pub struct AmplitudeRingBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl AmplitudeRingBuffer {
    /// 新しいリングバッファを作成
    ///
    /// 容量は `MIN_CAPACITY` を下回らない。
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// サンプルを1つ追加
    ///
    /// 容量に達している場合、最古のエントリを上書きする。
    pub fn push(&mut self, sample: f32) {
        self.push_repeated(sample, 1);
    }

    /// 同じサンプルを `repeat` 個追加
    ///
    /// 1サンプルあたり O(1) の循環上書き。
    pub fn push_repeated(&mut self, sample: f32, repeat: usize) {
        for _ in 0..repeat {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    /// 容量を変更
    ///
    /// 最新の `min(capacity, new_capacity)` サンプルを相対順序を
    /// 保ったまま維持する。古いサンプルは黙って破棄される。
    /// 同じ容量への変更は何もしない。容量の下限は `MIN_CAPACITY`。
    pub fn resize(&mut self, new_capacity: usize) {
        let new_capacity = new_capacity.max(MIN_CAPACITY);
        if new_capacity == self.capacity {
            return;
        }

        // 縮小時は最古のサンプルから破棄
        while self.samples.len() > new_capacity {
            self.samples.pop_front();
        }

        self.capacity = new_capacity;
    }

    /// 最新の `count` 個のサンプルを時系列順（古い順）で取得
    ///
    /// バッファは変更しない。`count` が 0 の場合は空を返す。
    pub fn snapshot(&self, count: usize) -> Vec<f32> {
        let take = count.min(self.samples.len());
        self.samples
            .iter()
            .skip(self.samples.len() - take)
            .copied()
            .collect()
    }

    /// 保持中のサンプル数
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// バッファが空かどうか
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 現在の容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// サンプル列のRMS（二乗平均平方根）振幅を計算
///
/// キャプチャコールバックがバッファごとに1つのスカラーを
/// リングバッファへ押し込むために使う。入力は -1.0 ~ 1.0 に
/// 正規化されたサンプルを想定する。
pub fn rms_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_of_squares: f64 = samples.iter().map(|&s| s as f64 * s as f64).sum();
    let mean_square = sum_of_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_overflow() {
        let capacity = 16;
        let k = 5;
        let mut ring = AmplitudeRingBuffer::new(capacity);

        // capacity + k 個の連番を追加
        for i in 0..(capacity + k) {
            ring.push(i as f32);
        }

        // 最後の capacity 個が追加順に残る
        let snapshot = ring.snapshot(capacity);
        assert_eq!(snapshot.len(), capacity);
        for (idx, value) in snapshot.iter().enumerate() {
            assert_eq!(*value, (k + idx) as f32);
        }
    }

    #[test]
    fn test_resize_grow_preserves_samples() {
        let capacity = 16;
        let mut ring = AmplitudeRingBuffer::new(capacity);

        for i in 0..capacity {
            ring.push(i as f32);
        }

        // 拡大しても既存サンプルは順序ごと保持される
        ring.resize(capacity * 2);
        let snapshot = ring.snapshot(capacity);
        assert_eq!(snapshot.len(), capacity);
        for (idx, value) in snapshot.iter().enumerate() {
            assert_eq!(*value, idx as f32);
        }
    }

    #[test]
    fn test_resize_shrink_keeps_newest() {
        let mut ring = AmplitudeRingBuffer::new(32);
        for i in 0..32 {
            ring.push(i as f32);
        }

        ring.resize(8);
        let snapshot = ring.snapshot(32);

        // 最新8個のみが残る
        assert_eq!(snapshot, vec![24.0, 25.0, 26.0, 27.0, 28.0, 29.0, 30.0, 31.0]);
    }

    #[test]
    fn test_resize_same_capacity_noop() {
        let mut ring = AmplitudeRingBuffer::new(16);
        for i in 0..16 {
            ring.push(i as f32);
        }

        ring.resize(16);
        assert_eq!(ring.len(), 16);
        assert_eq!(ring.capacity(), 16);
    }

    #[test]
    fn test_capacity_floor() {
        let ring = AmplitudeRingBuffer::new(2);
        assert_eq!(ring.capacity(), MIN_CAPACITY);

        let mut ring = AmplitudeRingBuffer::new(64);
        ring.resize(1);
        assert_eq!(ring.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn test_snapshot_zero_count() {
        let mut ring = AmplitudeRingBuffer::new(16);
        ring.push(1.0);
        assert!(ring.snapshot(0).is_empty());
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut ring = AmplitudeRingBuffer::new(16);
        ring.push(1.0);
        ring.push(2.0);

        let _ = ring.snapshot(16);
        let again = ring.snapshot(16);
        assert_eq!(again, vec![1.0, 2.0]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_push_repeated() {
        let mut ring = AmplitudeRingBuffer::new(8);
        ring.push_repeated(0.5, 12);

        // 容量を超えた分は上書きされ、全て同じ値
        assert_eq!(ring.len(), 8);
        assert!(ring.snapshot(8).iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_snapshot_survives_intervening_resize() {
        // push → resize → push の後も最新 capacity 個が push 順で返る
        let mut ring = AmplitudeRingBuffer::new(8);
        for i in 0..8 {
            ring.push(i as f32);
        }
        ring.resize(12);
        for i in 8..16 {
            ring.push(i as f32);
        }

        let snapshot = ring.snapshot(12);
        assert_eq!(snapshot.len(), 12);
        for (idx, value) in snapshot.iter().enumerate() {
            assert_eq!(*value, (4 + idx) as f32);
        }
    }

    #[test]
    fn test_rms_amplitude() {
        // 全て同じ値ならRMSは絶対値と等しい
        let samples = vec![0.5f32; 100];
        let rms = rms_amplitude(&samples);
        assert!((rms - 0.5).abs() < 1e-6);

        // 空入力は0
        assert_eq!(rms_amplitude(&[]), 0.0);

        // 無音は0
        assert_eq!(rms_amplitude(&[0.0; 64]), 0.0);
    }
}
