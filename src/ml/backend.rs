// ============================================================
// Layer 5: Backends
// ============================================================
// Training needs gradients, so both backends are wrapped in
// Autodiff. Which one a run uses comes from DeviceConfig:
//
//   ngpu = 0  →  CpuBackend  (Autodiff<NdArray>)
//   ngpu > 0  →  GpuBackend  (Autodiff<Wgpu>) on GPU `device_id`
//
// device_id 0 is wgpu's default adapter, whichever kind it is;
// other ids pick that discrete GPU.

use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};

use crate::application::config::DeviceConfig;

pub type CpuBackend = Autodiff<NdArray>;
pub type GpuBackend = Autodiff<Wgpu>;

pub fn cpu_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

pub fn gpu_device(cfg: &DeviceConfig) -> WgpuDevice {
    if cfg.ngpu > 1 {
        tracing::warn!("ngpu = {} but runs use a single device; using GPU {}", cfg.ngpu, cfg.device_id);
    }
    match cfg.device_id {
        0  => WgpuDevice::default(),
        id => WgpuDevice::DiscreteGpu(id),
    }
}
