pub mod activities;
pub mod albums;
pub mod artists;
pub mod auth;
pub mod media_file;
pub mod musics;
pub mod player;
pub mod playlists;
pub mod reviews;
pub mod uploads;
pub mod users;
