pub mod activity;
pub mod album;
pub mod artist;
pub mod music;
pub mod playlist;
pub mod playlist_music;
pub mod review;
pub mod session;
pub mod upload;
pub mod user;
