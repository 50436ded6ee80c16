pub mod ffmpeg_audio_router;
