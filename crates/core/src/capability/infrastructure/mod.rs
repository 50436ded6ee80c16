pub mod wgpu_prober;
