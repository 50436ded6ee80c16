pub mod gpu_upscaler;
pub mod upscaler_factory;
