use lyricast_core::{FrameBuffer, LyricastResult, PixelFormat};

/// Source of export frames, called once per frame in increasing index order
/// on the exporting thread.
///
/// An error drops that frame; the export carries on. A producer that
/// substitutes a fallback frame instead reports it through
/// [`fallbacks`](FrameProducer::fallbacks): the frame is written and counted
/// as dropped.
pub trait FrameProducer {
    fn produce(&mut self, index: u64, timestamp: f64) -> LyricastResult<FrameBuffer>;

    /// Fallback frames produced so far.
    fn fallbacks(&self) -> u64 {
        0
    }
}

impl<F> FrameProducer for F
where
    F: FnMut(u64, f64) -> LyricastResult<FrameBuffer>,
{
    fn produce(&mut self, index: u64, timestamp: f64) -> LyricastResult<FrameBuffer> {
        self(index, timestamp)
    }
}

/// Raw RGBA bytes of a frame, or `None` when its size is not the export size.
pub fn raw_frame(frame: FrameBuffer, width: u32, height: u32) -> Option<Vec<u8>> {
    if frame.width != width || frame.height != height {
        return None;
    }
    let frame = match frame.format {
        PixelFormat::Rgba8 => frame,
        PixelFormat::Rgb8 => frame.to_rgba8(),
    };
    let expected = width as usize * height as usize * 4;
    (frame.data.len() == expected).then(|| frame.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyricast_core::Color;

    #[test]
    fn test_closure_is_producer() {
        let mut calls = Vec::new();
        let mut producer = |i: u64, t: f64| -> LyricastResult<FrameBuffer> {
            calls.push((i, t));
            Ok(FrameBuffer::solid(2, 2, &Color::RED))
        };
        producer.produce(3, 0.1).unwrap();
        assert_eq!(calls, vec![(3, 0.1)]);
    }

    #[test]
    fn test_raw_frame_converts_rgb() {
        let mut rgb = FrameBuffer::new(2, 1, PixelFormat::Rgb8);
        rgb.set_pixel(0, 0, [1, 2, 3, 255]);
        let raw = raw_frame(rgb, 2, 1).unwrap();
        assert_eq!(raw, vec![1, 2, 3, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_raw_frame_rejects_wrong_size() {
        assert!(raw_frame(FrameBuffer::solid(4, 4, &Color::BLACK), 4, 2).is_none());
    }
}
