//! Cached, auth-retried reads and writes against the music resource API.
//!
//! Every read goes through [`ResponseCache::get_or_compute`](crate::cache::ResponseCache) keyed
//! under the user's namespace, and every upstream request goes through
//! [`Broker::call_with_auth`]. Writes are not cached and invalidate the reads they affect.

pub mod model;

pub use model::{Album, AlbumPage, Artist, NewPlaylist, Playlist};

// self
use crate::{
	_prelude::*,
	api::model::{Page, RawAlbum, RawArtist, RawPlaylist},
	auth::{ArtistId, UserId, UserProfile},
	cache::CacheKey,
	error::ConfigError,
	flows::{Broker, common},
	http::{self, HttpResponse, Method, UpstreamHttpClient},
	oauth::TransportErrorMapper,
};

/// Default page size for artist albums.
pub const DEFAULT_ALBUM_LIMIT: u32 = 20;

impl<C, M> Broker<C, M>
where
	C: ?Sized + UpstreamHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns the user's top artists.
	pub async fn top_artists(&self, user_id: &UserId) -> Result<Vec<Artist>> {
		let key = self.user_key(user_id).segment("top-artists");

		self.cache
			.get_or_compute(&key, self.cache_ttl_secs, move || async move {
				let url = self.api_url(["me", "top", "artists"])?;
				let response = self.authorized(user_id, Method::GET, &url, None).await?;
				let page: Page<RawArtist> = common::decode_json(&response)?;

				Ok(page.items.into_iter().map(Artist::from).collect())
			})
			.await
	}

	/// Returns one page of an artist's albums.
	pub async fn artist_albums(
		&self,
		user_id: &UserId,
		artist_id: &ArtistId,
		limit: u32,
		offset: u32,
	) -> Result<AlbumPage> {
		let key = self
			.user_key(user_id)
			.segment("artist")
			.segment(artist_id)
			.segment("albums")
			.param("limit", limit)
			.param("offset", offset);

		self.cache
			.get_or_compute(&key, self.cache_ttl_secs, move || async move {
				let mut url = self.api_url(["artists", artist_id.as_ref(), "albums"])?;

				url.query_pairs_mut()
					.append_pair("limit", &limit.to_string())
					.append_pair("offset", &offset.to_string());

				let response = self.authorized(user_id, Method::GET, &url, None).await?;
				let page: Page<RawAlbum> = common::decode_json(&response)?;

				Ok(AlbumPage {
					albums: page.items.into_iter().map(Album::from).collect(),
					total: page.total,
				})
			})
			.await
	}

	/// Returns the user's playlists.
	pub async fn playlists(&self, user_id: &UserId) -> Result<Vec<Playlist>> {
		let key = self.playlists_key(user_id);

		self.cache
			.get_or_compute(&key, self.cache_ttl_secs, move || async move {
				let url = self.api_url(["me", "playlists"])?;
				let response = self.authorized(user_id, Method::GET, &url, None).await?;
				let page: Page<RawPlaylist> = common::decode_json(&response)?;

				Ok(page.items.into_iter().map(Playlist::from).collect())
			})
			.await
	}

	/// Returns the stored profile of a signed-in user without calling upstream.
	pub async fn profile(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
		self.credentials.load_profile(user_id).await
	}

	/// Creates a playlist owned by the user and drops the cached playlist listing.
	pub async fn create_playlist(
		&self,
		user_id: &UserId,
		playlist: NewPlaylist,
	) -> Result<Playlist> {
		playlist.validate()?;

		let url = self.api_url(["users", user_id.as_ref(), "playlists"])?;
		let body = serde_json::to_vec(&playlist)
			.map_err(|source| ConfigError::InvalidRequestBody { source })?;
		let response = self.authorized(user_id, Method::POST, &url, Some(body)).await?;
		let created: RawPlaylist = common::decode_json(&response)?;

		self.cache.invalidate(self.playlists_key(user_id)).await?;

		Ok(created.into())
	}

	/// Signs the user out by deleting their credential record.
	pub async fn sign_out(&self, user_id: &UserId) -> Result<()> {
		self.credentials.delete(user_id).await
	}

	async fn authorized(
		&self,
		user_id: &UserId,
		method: Method,
		url: &Url,
		body: Option<Vec<u8>>,
	) -> Result<HttpResponse> {
		self.call_with_auth(user_id, |token| {
			let method = method.clone();
			let body = body.clone();

			async move {
				let request = http::bearer_request(method, url, &token, body)?;

				self.send(request).await
			}
		})
		.await
	}

	fn api_url<const N: usize>(&self, segments: [&str; N]) -> Result<Url> {
		self.descriptor.api_url(segments).map_err(|e| ConfigError::from(e).into())
	}

	fn user_key(&self, user_id: &UserId) -> CacheKey {
		CacheKey::user(self.credentials.prefix(), user_id)
	}

	fn playlists_key(&self, user_id: &UserId) -> CacheKey {
		self.user_key(user_id).segment("playlists")
	}
}
