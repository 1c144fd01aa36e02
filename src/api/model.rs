//! Simplified resource shapes returned to callers and the upstream payloads they come from.
//!
//! Simplified types serialize in camelCase and are also what the response cache stores, so they
//! must round-trip through their own serde representation.

// self
use crate::{
	_prelude::*,
	auth::{UserId, UserProfile},
	error::ConfigError,
};

/// One of the user's top artists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
	/// Upstream artist identifier.
	pub id: String,
	/// Artist name.
	pub name: String,
	/// Genre tags.
	pub genres: Vec<String>,
	/// First (largest) image, when any.
	pub image_url: Option<String>,
	/// Follower count.
	pub followers: u64,
}

/// One album in an artist's discography.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
	/// Upstream album identifier.
	pub id: String,
	/// Album title.
	pub name: String,
	/// First (largest) cover image, when any.
	pub image_url: Option<String>,
	/// Number of tracks.
	pub total_tracks: u32,
	/// Release date as published upstream (year, year-month, or full date).
	pub release_date: String,
}

/// A page of albums plus the size of the whole collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumPage {
	/// Albums in this page.
	pub albums: Vec<Album>,
	/// Total albums across all pages.
	pub total: u64,
}

/// One of the user's playlists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
	/// Upstream playlist identifier.
	pub id: String,
	/// Playlist name.
	pub name: String,
	/// Description; empty descriptions are `None`.
	pub description: Option<String>,
	/// First cover image, when any.
	pub image_url: Option<String>,
	/// Track count; `0` when upstream omits it.
	pub tracks: u64,
}

/// Request body for creating a playlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylist {
	/// Playlist name; must not be blank.
	pub name: String,
	/// Optional description.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Optional visibility flag; upstream defaults to public.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub public: Option<bool>,
}
impl NewPlaylist {
	/// Creates a request with only the name set.
	pub fn new(name: impl Into<String>) -> Self {
		Self { name: name.into(), description: None, public: None }
	}

	/// Sets the description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());

		self
	}

	/// Sets the visibility flag.
	pub fn with_public(mut self, public: bool) -> Self {
		self.public = Some(public);

		self
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		if self.name.trim().is_empty() { Err(ConfigError::InvalidPlaylistName) } else { Ok(()) }
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
	pub(crate) items: Vec<T>,
	#[serde(default)]
	pub(crate) total: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Image {
	url: String,
}

fn first_image(images: Option<Vec<Image>>) -> Option<String> {
	images.and_then(|images| images.into_iter().next()).map(|image| image.url)
}

#[derive(Debug, Deserialize)]
struct Followers {
	total: u64,
}

#[derive(Debug, Deserialize)]
struct TrackTotal {
	total: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawArtist {
	id: String,
	name: String,
	#[serde(default)]
	genres: Vec<String>,
	#[serde(default)]
	images: Option<Vec<Image>>,
	followers: Followers,
}
impl From<RawArtist> for Artist {
	fn from(raw: RawArtist) -> Self {
		Self {
			id: raw.id,
			name: raw.name,
			genres: raw.genres,
			image_url: first_image(raw.images),
			followers: raw.followers.total,
		}
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAlbum {
	id: String,
	name: String,
	#[serde(default)]
	images: Option<Vec<Image>>,
	total_tracks: u32,
	release_date: String,
}
impl From<RawAlbum> for Album {
	fn from(raw: RawAlbum) -> Self {
		Self {
			id: raw.id,
			name: raw.name,
			image_url: first_image(raw.images),
			total_tracks: raw.total_tracks,
			release_date: raw.release_date,
		}
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPlaylist {
	id: String,
	name: String,
	#[serde(default)]
	description: Option<String>,
	#[serde(default)]
	images: Option<Vec<Image>>,
	#[serde(default)]
	tracks: Option<TrackTotal>,
}
impl From<RawPlaylist> for Playlist {
	fn from(raw: RawPlaylist) -> Self {
		Self {
			id: raw.id,
			name: raw.name,
			description: raw.description.filter(|text| !text.is_empty()),
			image_url: first_image(raw.images),
			tracks: raw.tracks.map_or(0, |tracks| tracks.total),
		}
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProfile {
	id: String,
	#[serde(default)]
	display_name: Option<String>,
	#[serde(default)]
	email: Option<String>,
	#[serde(default)]
	images: Option<Vec<Image>>,
}
impl TryFrom<RawProfile> for UserProfile {
	type Error = ConfigError;

	fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
		let mut profile = UserProfile::new(UserId::new(&raw.id)?);

		profile.display_name = raw.display_name;
		profile.email = raw.email;
		profile.avatar_url = first_image(raw.images);

		Ok(profile)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn playlist_simplification_fills_gaps() {
		let raw: RawPlaylist = serde_json::from_str(
			r#"{"id":"p1","name":"Mix","description":"","images":null,"tracks":null}"#,
		)
		.expect("Sparse playlist should decode.");
		let playlist = Playlist::from(raw);

		assert_eq!(playlist.description, None);
		assert_eq!(playlist.image_url, None);
		assert_eq!(playlist.tracks, 0);
	}

	#[test]
	fn artist_keeps_first_image_and_follower_total() {
		let raw: RawArtist = serde_json::from_str(
			r#"{"id":"a1","name":"Band","images":[{"url":"big"},{"url":"small"}],"followers":{"total":42}}"#,
		)
		.expect("Artist should decode.");
		let artist = Artist::from(raw);

		assert_eq!(artist.image_url.as_deref(), Some("big"));
		assert_eq!(artist.followers, 42);
		assert!(artist.genres.is_empty());

		let json = serde_json::to_value(&artist).expect("Artist should serialize.");

		assert_eq!(json["imageUrl"], "big");
	}

	#[test]
	fn profile_requires_valid_identifier() {
		let raw: RawProfile =
			serde_json::from_str(r#"{"id":"","display_name":"Nobody"}"#).expect("Should decode.");

		assert!(UserProfile::try_from(raw).is_err());
	}

	#[test]
	fn blank_playlist_names_are_rejected() {
		assert!(matches!(NewPlaylist::new("  ").validate(), Err(ConfigError::InvalidPlaylistName)));
		assert!(NewPlaylist::new("Road trip").with_public(false).validate().is_ok());
	}
}
