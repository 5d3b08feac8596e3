/*!
    Reusable output buffers for decoded video planes and audio PCM.

    Callers own these buffers and lend them to the engine for every fill.
    Each byte region keeps its allocation across frames: a fill only
    reallocates when the new content does not fit the current capacity.
*/

use crate::{AudioOutputFormat, PixelFormat};

/**
    A byte region whose capacity is decoupled from its content size.

    Capacity never shrinks. Growing replaces the allocation outright, the
    previous content is not carried over since every fill overwrites it.
*/
#[derive(Clone, Debug, Default)]
pub struct GrowableRegion {
    storage: Box<[u8]>,
    len: usize,
    grow_count: usize,
}

impl GrowableRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity].into_boxed_slice(),
            len: 0,
            grow_count: 0,
        }
    }

    /**
        Bytes currently allocated.
    */
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /**
        Bytes meaningful for the current frame.
    */
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /**
        How many times this region had to reallocate.
    */
    pub fn grow_count(&self) -> usize {
        self.grow_count
    }

    /**
        Replace the content with `bytes`.
    */
    pub fn fill(&mut self, bytes: &[u8]) {
        self.fill_in_place(bytes.len()).copy_from_slice(bytes);
    }

    /**
        Set the content size to `len` and return the content for writing.

        The returned bytes hold whatever the previous frame left behind;
        the caller is expected to overwrite all of them.
    */
    pub fn fill_in_place(&mut self, len: usize) -> &mut [u8] {
        self.reserve_exact(len);
        self.len = len;
        &mut self.storage[..len]
    }

    /**
        Shrink the content size (never the capacity) to `len`.
    */
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /**
        Mark the region as holding nothing, keeping its allocation.
    */
    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn reserve_exact(&mut self, needed: usize) {
        if needed > self.storage.len() {
            self.storage = vec![0; needed].into_boxed_slice();
            self.grow_count += 1;
        }
    }
}

/**
    Pixel layouts a decoded video buffer can carry.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VideoLayout {
    /// Interleaved RGBA, 4 bytes per pixel
    Rgba,
    /// Planar Y, U and V
    Yuv420p,
    /// Y plane plus interleaved UV plane
    Nv12,
    /// Y plane plus interleaved VU plane
    Nv21,
}

impl VideoLayout {
    /**
        The layout a frame of `format` can be copied into without conversion.
    */
    pub const fn native_for(format: PixelFormat) -> Option<Self> {
        match format {
            PixelFormat::Yuv420p => Some(Self::Yuv420p),
            PixelFormat::Nv12 => Some(Self::Nv12),
            PixelFormat::Nv21 => Some(Self::Nv21),
            PixelFormat::Rgba => Some(Self::Rgba),
            _ => None,
        }
    }

    /**
        The planes this layout populates, in source plane order.
    */
    pub const fn planes(self) -> &'static [Plane] {
        match self {
            Self::Rgba => &[Plane::Rgba],
            Self::Yuv420p => &[Plane::Y, Plane::U, Plane::V],
            Self::Nv12 | Self::Nv21 => &[Plane::Y, Plane::Uv],
        }
    }
}

/**
    Which layout the caller wants frames delivered in.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutPreference {
    /// Copy natively when the source layout allows it, otherwise RGBA.
    #[default]
    Native,
    /// Always convert to RGBA.
    Rgba,
}

/**
    One of the five byte regions of a [`DecodedVideoBuffer`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Plane {
    Rgba,
    Y,
    U,
    V,
    Uv,
}

impl Plane {
    /**
        Bytes per row and row count of this plane for a `width`x`height`
        frame, tightly packed.
    */
    pub const fn dimensions(self, width: u32, height: u32) -> (usize, usize) {
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        match self {
            Self::Rgba => (w * 4, h),
            Self::Y => (w, h),
            Self::U | Self::V => (cw, ch),
            Self::Uv => (cw * 2, ch),
        }
    }
}

/**
    A reusable decoded video frame.

    Exactly one layout's planes carry content after a fill; the other
    regions report zero length but keep their capacity.
*/
#[derive(Clone, Debug, Default)]
pub struct DecodedVideoBuffer {
    rgba: GrowableRegion,
    y: GrowableRegion,
    u: GrowableRegion,
    v: GrowableRegion,
    uv: GrowableRegion,
    layout: Option<VideoLayout>,
    preference: LayoutPreference,
    width: u32,
    height: u32,
    pts_ms: i64,
    duration_ms: i64,
}

impl DecodedVideoBuffer {
    pub fn new(preference: LayoutPreference) -> Self {
        Self {
            preference,
            ..Self::default()
        }
    }

    pub fn preference(&self) -> LayoutPreference {
        self.preference
    }

    pub fn set_preference(&mut self, preference: LayoutPreference) {
        self.preference = preference;
    }

    /**
        Layout of the current content, `None` before the first fill.
    */
    pub fn layout(&self) -> Option<VideoLayout> {
        self.layout
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pts_ms(&self) -> i64 {
        self.pts_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn plane(&self, plane: Plane) -> &GrowableRegion {
        match plane {
            Plane::Rgba => &self.rgba,
            Plane::Y => &self.y,
            Plane::U => &self.u,
            Plane::V => &self.v,
            Plane::Uv => &self.uv,
        }
    }

    pub fn plane_mut(&mut self, plane: Plane) -> &mut GrowableRegion {
        match plane {
            Plane::Rgba => &mut self.rgba,
            Plane::Y => &mut self.y,
            Plane::U => &mut self.u,
            Plane::V => &mut self.v,
            Plane::Uv => &mut self.uv,
        }
    }

    /**
        Start a new frame: every region's content is emptied, then the
        geometry and layout of the incoming frame are recorded.
    */
    pub fn begin_frame(&mut self, layout: VideoLayout, width: u32, height: u32) {
        for region in [
            &mut self.rgba,
            &mut self.y,
            &mut self.u,
            &mut self.v,
            &mut self.uv,
        ] {
            region.clear();
        }
        self.layout = Some(layout);
        self.width = width;
        self.height = height;
    }

    pub fn set_timing(&mut self, pts_ms: i64, duration_ms: i64) {
        self.pts_ms = pts_ms;
        self.duration_ms = duration_ms;
    }

    /**
        Total number of reallocations across all regions.
    */
    pub fn grow_count(&self) -> usize {
        [&self.rgba, &self.y, &self.u, &self.v, &self.uv]
            .iter()
            .map(|r| r.grow_count())
            .sum()
    }
}

/**
    A reusable decoded audio frame holding interleaved PCM.
*/
#[derive(Clone, Debug, Default)]
pub struct DecodedAudioBuffer {
    pcm: GrowableRegion,
    pts_ms: i64,
    duration_ms: i64,
    samples: usize,
    format: Option<AudioOutputFormat>,
}

impl DecodedAudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pcm(&self) -> &GrowableRegion {
        &self.pcm
    }

    pub fn pcm_mut(&mut self) -> &mut GrowableRegion {
        &mut self.pcm
    }

    pub fn pts_ms(&self) -> i64 {
        self.pts_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    /**
        Per-channel sample count of the current content.
    */
    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn format(&self) -> Option<AudioOutputFormat> {
        self.format
    }

    /**
        Record what the PCM region now holds. Duration is derived from the
        sample count.
    */
    pub fn set_frame(&mut self, pts_ms: i64, samples: usize, format: AudioOutputFormat) {
        self.pts_ms = pts_ms;
        self.samples = samples;
        self.duration_ms = format.samples_to_millis(samples);
        self.format = Some(format);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_grows_once_per_size_increase() {
        let mut region = GrowableRegion::new();
        let sizes = [16, 16, 32, 32, 32, 64, 64];
        let mut last_capacity = 0;
        for size in sizes {
            region.fill(&vec![7; size]);
            assert_eq!(region.len(), size);
            assert!(region.len() <= region.capacity());
            assert!(region.capacity() >= last_capacity);
            last_capacity = region.capacity();
        }
        assert_eq!(region.grow_count(), 3);
    }

    #[test]
    fn region_never_shrinks() {
        let mut region = GrowableRegion::with_capacity(128);
        region.fill(&[1, 2, 3]);
        assert_eq!(region.capacity(), 128);
        assert_eq!(region.as_slice(), &[1, 2, 3]);
        region.fill_in_place(8).fill(9);
        region.truncate(4);
        assert_eq!(region.as_slice(), &[9, 9, 9, 9]);
        region.clear();
        assert!(region.is_empty());
        assert_eq!(region.capacity(), 128);
        assert_eq!(region.grow_count(), 0);
    }

    #[test]
    fn begin_frame_empties_other_layouts() {
        let mut buffer = DecodedVideoBuffer::default();
        buffer.begin_frame(VideoLayout::Rgba, 4, 2);
        buffer.plane_mut(Plane::Rgba).fill(&[0; 32]);

        buffer.begin_frame(VideoLayout::Nv12, 4, 2);
        buffer.plane_mut(Plane::Y).fill(&[0; 8]);
        buffer.plane_mut(Plane::Uv).fill(&[0; 4]);

        assert_eq!(buffer.layout(), Some(VideoLayout::Nv12));
        assert_eq!(buffer.plane(Plane::Rgba).len(), 0);
        assert_eq!(buffer.plane(Plane::Rgba).capacity(), 32);
        assert_eq!(buffer.plane(Plane::Y).len(), 8);
        assert_eq!(buffer.grow_count(), 3);
    }

    #[test]
    fn plane_dimensions_round_odd_sizes_up() {
        assert_eq!(Plane::Y.dimensions(5, 3), (5, 3));
        assert_eq!(Plane::U.dimensions(5, 3), (3, 2));
        assert_eq!(Plane::Uv.dimensions(5, 3), (6, 2));
        assert_eq!(Plane::Rgba.dimensions(5, 3), (20, 3));
    }

    #[test]
    fn layout_planes() {
        assert_eq!(VideoLayout::Yuv420p.planes(), &[Plane::Y, Plane::U, Plane::V]);
        assert_eq!(VideoLayout::Nv21.planes(), &[Plane::Y, Plane::Uv]);
        assert_eq!(
            VideoLayout::native_for(PixelFormat::Nv12),
            Some(VideoLayout::Nv12)
        );
        assert_eq!(VideoLayout::native_for(PixelFormat::Yuv444p), None);
    }

    #[test]
    fn audio_buffer_derives_duration() {
        let mut buffer = DecodedAudioBuffer::new();
        let format = AudioOutputFormat::default();
        buffer.pcm_mut().fill(&[0; 4096]);
        buffer.set_frame(1000, 1024, format);
        assert_eq!(buffer.duration_ms(), 23);
        assert_eq!(buffer.samples(), 1024);
        assert_eq!(buffer.format(), Some(format));
    }
}
