pub mod content_store_loader;
