//! Real-time neural video upscaling pipeline.
//!
//! The pipeline probes the local GPU backend, loads a super-resolution model
//! from a content store, upscales a source video frame by frame in lock-step
//! with playback, recombines the upscaled frames with the source's audio
//! track, and encodes the result with a negotiated container/codec pair.
//!
//! Each bounded context is split into `domain` (traits and pure types) and
//! `infrastructure` (wgpu, ffmpeg, HTTP). Orchestration lives in `pipeline`.

pub mod shared {
    pub mod constants;
    pub mod frame_surface;
    pub mod playback_clock;
    pub mod video_metadata;
}

pub mod capability {
    pub mod domain {
        pub mod capability_prober;
    }
    pub mod infrastructure;
}

pub mod model {
    pub mod domain {
        pub mod model_loader;
    }
    pub mod infrastructure;
}

pub mod upscale {
    pub mod domain {
        pub mod frame_upscaler;
    }
    pub mod infrastructure;
}

pub mod source {
    pub mod domain {
        pub mod video_source;
    }
    pub mod infrastructure;
}

pub mod audio {
    pub mod domain {
        pub mod audio_router;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod capture_mixer;
}

pub mod encode {
    pub mod domain {
        pub mod encoder_session;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod frame_driver;
    pub mod job_error;
    pub mod progress;
    pub mod upscale_video_use_case;
}
