/*!
    Hardware device contexts.
*/

use std::ptr;

use ffmpeg_next::{Codec, ffi, util::frame::video::Video as VideoFrameFFmpeg};
use tracing::debug;

use tmedia_types::{Error, Result};

/**
    Hardware decode APIs, one per platform family.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwDeviceType {
    VideoToolbox,
    Vaapi,
    Cuda,
    D3d11va,
}

impl HwDeviceType {
    /**
        Device types worth trying on this platform, in order of preference.
    */
    pub fn platform_defaults() -> &'static [HwDeviceType] {
        if cfg!(target_os = "macos") {
            &[Self::VideoToolbox]
        } else if cfg!(target_os = "windows") {
            &[Self::D3d11va, Self::Cuda]
        } else if cfg!(target_os = "linux") {
            &[Self::Vaapi, Self::Cuda]
        } else {
            &[]
        }
    }

    fn to_ffmpeg(self) -> ffi::AVHWDeviceType {
        match self {
            Self::VideoToolbox => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
            Self::Vaapi => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
            Self::Cuda => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
            Self::D3d11va => ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
        }
    }
}

/**
    An owned reference to an FFmpeg hardware device context.

    The decoder context takes its own reference through
    [`HwDeviceContext::create_ref`]; this one is released on drop.
*/
pub struct HwDeviceContext {
    ptr: *mut ffi::AVBufferRef,
    device_type: HwDeviceType,
}

impl HwDeviceContext {
    /**
        Create a device context of the given type.
    */
    pub fn create(device_type: HwDeviceType) -> Result<Self> {
        let mut ptr: *mut ffi::AVBufferRef = ptr::null_mut();
        // SAFETY: av_hwdevice_ctx_create writes a new buffer reference on success
        let ret = unsafe {
            ffi::av_hwdevice_ctx_create(
                &mut ptr,
                device_type.to_ffmpeg(),
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };
        if ret < 0 || ptr.is_null() {
            return Err(Error::HardwareUnavailable(format!(
                "{:?} device: {}",
                device_type,
                ffmpeg_next::Error::from(ret)
            )));
        }
        Ok(Self { ptr, device_type })
    }

    /**
        Create the first platform device that `codec` can decode on.
    */
    pub fn for_codec(codec: &Codec) -> Result<Self> {
        let mut last_error = None;
        for &device_type in HwDeviceType::platform_defaults() {
            if !codec_supports(codec, device_type) {
                continue;
            }
            match Self::create(device_type) {
                Ok(ctx) => return Ok(ctx),
                Err(e) => {
                    debug!(?device_type, error = %e, "hardware device unavailable");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            Error::HardwareUnavailable(format!("no hardware device for {}", codec.name()))
        }))
    }

    pub fn device_type(&self) -> HwDeviceType {
        self.device_type
    }

    /**
        A new reference for handing to a codec context, which takes
        ownership of it.
    */
    pub fn create_ref(&self) -> *mut ffi::AVBufferRef {
        // SAFETY: self.ptr is a valid buffer reference until drop
        unsafe { ffi::av_buffer_ref(self.ptr) }
    }
}

impl Drop for HwDeviceContext {
    fn drop(&mut self) {
        // SAFETY: we own this reference; av_buffer_unref nulls the pointer
        unsafe { ffi::av_buffer_unref(&mut self.ptr) };
    }
}

impl std::fmt::Debug for HwDeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HwDeviceContext")
            .field("device_type", &self.device_type)
            .finish_non_exhaustive()
    }
}

/**
    Check whether `codec` advertises decoding through a device context of
    this type.
*/
fn codec_supports(codec: &Codec, device_type: HwDeviceType) -> bool {
    let wanted = device_type.to_ffmpeg();
    let mut index = 0;
    loop {
        // SAFETY: avcodec_get_hw_config returns null past the last entry
        let config = unsafe { ffi::avcodec_get_hw_config(codec.as_ptr(), index) };
        if config.is_null() {
            return false;
        }
        let (methods, config_type) = unsafe { ((*config).methods, (*config).device_type) };
        if config_type == wanted
            && methods & ffi::AV_CODEC_HW_CONFIG_METHOD_HW_DEVICE_CTX as i32 != 0
        {
            return true;
        }
        index += 1;
    }
}

/**
    Check if a frame lives in device memory and needs a transfer.
*/
pub(crate) fn is_hw_frame(frame: &VideoFrameFFmpeg) -> bool {
    // SAFETY: reading a field of a valid AVFrame
    unsafe { !(*frame.as_ptr()).hw_frames_ctx.is_null() }
}

/**
    Download a hardware frame into `dst`, carrying over timestamps.
*/
pub(crate) fn transfer_hw_frame(src: &VideoFrameFFmpeg, dst: &mut VideoFrameFFmpeg) -> Result<()> {
    // SAFETY: both frames are valid; dst is unreferenced before reuse
    unsafe {
        ffi::av_frame_unref(dst.as_mut_ptr());
        let ret = ffi::av_hwframe_transfer_data(dst.as_mut_ptr(), src.as_ptr(), 0);
        if ret < 0 {
            return Err(Error::codec(format!(
                "hardware frame transfer failed: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }
        let ret = ffi::av_frame_copy_props(dst.as_mut_ptr(), src.as_ptr());
        if ret < 0 {
            return Err(Error::codec(format!(
                "copying frame properties failed: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }
    }
    Ok(())
}
