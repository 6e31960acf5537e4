use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::model;

#[derive(Serialize, Debug)]
pub struct SongSetResponse {
    pub results: Vec<SongObject>,
}

impl From<Vec<model::Song>> for SongSetResponse {
    fn from(v: Vec<model::Song>) -> SongSetResponse {
        SongSetResponse {
            results: v.into_iter().map(SongObject::from).collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct AddSongRequest {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub file_size: u64,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub id: model::SongId,
    pub message: &'static str,
    pub song: SongObject,
}

#[derive(Serialize, Debug)]
pub struct RecommendationsResponse {
    pub recommendations: BTreeMap<String, Vec<SongObject>>,
}

#[derive(Serialize, Debug)]
pub struct LibraryStatsResponse {
    #[serde(flatten)]
    pub stats: model::LibraryStats,
    pub available_space_mb: f64,
    pub last_updated: String,
}

#[derive(Debug, Clone)]
pub struct SongObject {
    wrapped: model::Song,
}

impl From<model::Song> for SongObject {
    fn from(song: model::Song) -> SongObject {
        SongObject { wrapped: song }
    }
}

impl Serialize for SongObject {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let song = &self.wrapped;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("_links", &SongLinks { song })?;
        map.serialize_entry("id", &song.id())?;
        map.serialize_entry("title", song.title())?;
        map.serialize_entry("artist", song.artist())?;
        map.serialize_entry("genre", song.genre())?;
        map.serialize_entry("file_size", &song.file_size())?;
        map.serialize_entry("formatted_size", &song.formatted_file_size())?;
        map.serialize_entry("added_at", &song.added_at())?;
        map.serialize_entry("play_count", &song.play_count())?;
        map.serialize_entry("last_played", &song.last_played())?;
        map.end()
    }
}

struct SongLinks<'a> {
    song: &'a model::Song,
}

impl<'a> Serialize for SongLinks<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let id = self.song.id();
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("self", &HateoasLink {
            href: format!("/api/songs/{}", id),
            title: "song",
        })?;
        map.serialize_entry("play", &HateoasLink {
            href: format!("/api/songs/play/{}", id),
            title: "play",
        })?;
        map.serialize_entry("pause", &HateoasLink {
            href: format!("/api/songs/pause/{}", id),
            title: "pause",
        })?;
        map.serialize_entry("genre", &HateoasLink {
            href: format!("/api/songs?genre={}", encode_query_value(self.song.genre())),
            title: "genre",
        })?;
        map.end()
    }
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub struct HateoasLink<'a> {
    pub href: String,
    pub title: &'a str,
}

impl<'a> Serialize for HateoasLink<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("href", &self.href)?;
        map.serialize_entry("title", self.title)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Song, SongId};

    #[test]
    fn song_object_carries_links() {
        let song = Song::new(SongId(3), "Bohemian Rhapsody", "Queen", "Rock", 6 * 1024 * 1024).unwrap();
        let value = serde_json::to_value(SongObject::from(song)).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["title"], "Bohemian Rhapsody");
        assert_eq!(value["formatted_size"], "6.0 MB");
        assert_eq!(value["play_count"], 0);
        assert!(value["last_played"].is_null());
        assert_eq!(value["_links"]["play"]["href"], "/api/songs/play/3");
        assert_eq!(value["_links"]["self"]["title"], "song");
    }

    #[test]
    fn genre_link_is_percent_encoded() {
        let song = Song::new(SongId(4), "Crazy in Love", "Beyonce", "R&B Soul", 1024).unwrap();
        let value = serde_json::to_value(SongObject::from(song)).unwrap();
        assert_eq!(value["_links"]["genre"]["href"], "/api/songs?genre=R%26B+Soul");
    }
}
