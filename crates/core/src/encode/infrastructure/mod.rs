pub mod ffmpeg_encoder_session;
