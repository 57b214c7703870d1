//! CUDA session module.

use rustacuda::prelude::*;
use rustacuda::context::CurrentContext;
use rustacuda::memory::{DeviceBuffer, DeviceCopy};
use cublas_sys::*;
use l1h_core::solver::HomotopyError;

/// Checks a cuBLAS status.
///
/// Returns `Err` with [`HomotopyError::Device`] unless successful.
/// * `what` names the failed call for the log.
pub fn cublas_check(st: cublasStatus_t, what: &str) -> Result<(), HomotopyError>
{
    if st == cublasStatus_t::CUBLAS_STATUS_SUCCESS {
        Ok(())
    }
    else {
        log::error!("{} failed: {:?}", what, st);
        Err(HomotopyError::Device)
    }
}

/// CUDA context and cuBLAS handle owned by one backend.
///
/// The context is pushed as current at creation
/// and has to be made current by [`CudaSession::activate`] before it is used again
/// once another session is created on the same thread.
/// Like [`rustacuda::context::Context`], this is neither `Send` nor `Sync`.
pub struct CudaSession
{
    cublas_handle: cublasHandle_t,
    ctx: Context,
}

impl CudaSession
{
    /// Creates a session on a device.
    ///
    /// Returns [`CudaSession`] instance, or `Err` with [`HomotopyError::Resource`]
    /// if the driver, the device, the context or the cuBLAS handle is not available.
    /// * `device` is an ordinal number of CUDA devices.
    pub fn new(device: u32) -> Result<Self, HomotopyError>
    {
        let resource = |what: &str, e: rustacuda::error::CudaError| {
            log::error!("{}: {}", what, e);
            HomotopyError::Resource
        };

        rustacuda::init(CudaFlags::empty())
            .map_err(|e| resource("CUDA driver initialization failed", e))?;

        if let Ok(v) = rustacuda::CudaApiVersion::get() {
            log::info!("CUDA driver API version: {}.{}", v.major(), v.minor());
        }

        let dev = Device::get_device(device)
                  .map_err(|e| resource("CUDA device not found", e))?;

        if let Ok(name) = dev.name() {
            log::info!("CUDA device {}: {}", device, name);
        }

        let ctx = Context::create_and_push(ContextFlags::MAP_HOST | ContextFlags::SCHED_AUTO, dev)
                  .map_err(|e| resource("CUDA context failed to create", e))?;

        let mut cublas_handle: cublasHandle_t = std::ptr::null_mut();
        let st = unsafe {
            cublasCreate_v2(&mut cublas_handle)
        };
        if st != cublasStatus_t::CUBLAS_STATUS_SUCCESS {
            log::error!("cuBLAS handle failed to create: {:?}", st);
            return Err(HomotopyError::Resource);
        }

        log::debug!("CudaSession created");
        Ok(CudaSession {
            cublas_handle,
            ctx,
        })
    }

    /// Makes the context current for the calling thread.
    pub fn activate(&self) -> Result<(), HomotopyError>
    {
        CurrentContext::set_current(&self.ctx).map_err(|e| {
            log::error!("CUDA context failed to set current: {}", e);
            HomotopyError::Device
        })
    }

    /// Gets the cuBLAS handle.
    pub fn cublas_handle(&self) -> cublasHandle_t
    {
        self.cublas_handle
    }

    /// Allocates a new device buffer of the same contents as a given slice.
    ///
    /// Returns the device buffer, or `Err` with [`HomotopyError::Resource`].
    /// * `s` is the original slice.
    pub fn buf_from_slice<T: DeviceCopy>(&self, s: &[T]) -> Result<DeviceBuffer<T>, HomotopyError>
    {
        self.activate()?;

        DeviceBuffer::from_slice(s).map_err(|e| {
            log::error!("CUDA memory of {} elements failed to allocate: {}", s.len(), e);
            HomotopyError::Resource
        })
    }

    /// Allocates a new device buffer with zeroes.
    ///
    /// Returns the device buffer with a `length` (at least one), or `Err` with [`HomotopyError::Resource`].
    pub fn buf_zeroes<T: DeviceCopy>(&self, length: usize) -> Result<DeviceBuffer<T>, HomotopyError>
    {
        self.activate()?;

        unsafe {
            DeviceBuffer::zeroed(length.max(1))
        }.map_err(|e| {
            log::error!("CUDA memory of {} elements failed to allocate: {}", length, e);
            HomotopyError::Resource
        })
    }
}

impl Drop for CudaSession
{
    fn drop(&mut self)
    {
        let _ = self.activate();

        let st = unsafe {
            cublasDestroy_v2(self.cublas_handle)
        };
        if st != cublasStatus_t::CUBLAS_STATUS_SUCCESS {
            log::error!("cuBLAS handle failed to destroy: {:?}", st);
        }

        log::debug!("CudaSession dropped");
    }
}
