// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Association between feed episodes and files already on the station.
//!
//! The platform keeps no per-episode external key, so a remote file is
//! tied to a show by its artist/album tags and to an episode by title.
//! The prefix rules absorb the truncation and normalization the platform
//! applies to long tag values.

use crate::feed::{EpisodeRecord, ShowMetadata};
use crate::remote::RemoteFile;

/// Characters of the show author/title used for the substring rules
const PREFIX_LENGTH: usize = 10;

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn prefix(value: &str) -> String {
    value.chars().take(PREFIX_LENGTH).collect()
}

/// True when the file's artist/album tags tie it to `show`
pub fn belongs_to_show(file: &RemoteFile, show: &ShowMetadata) -> bool {
    let author = normalize(&show.author);
    let title = normalize(&show.title);
    if author.is_empty() && title.is_empty() {
        return false;
    }

    let artist = normalize(&file.artist);
    let album = normalize(&file.album);

    if !author.is_empty() && (artist == author || artist.contains(&prefix(&author))) {
        return true;
    }
    !title.is_empty() && (album == title || album.contains(&prefix(&title)))
}

/// True when some remote file already carries this episode
pub fn exists_remotely(
    episode: &EpisodeRecord,
    show: &ShowMetadata,
    remote_files: &[RemoteFile],
) -> bool {
    find_remote_match(episode, show, remote_files).is_some()
}

/// The first remote file matching this episode, if any
pub fn find_remote_match<'a>(
    episode: &EpisodeRecord,
    show: &ShowMetadata,
    remote_files: &'a [RemoteFile],
) -> Option<&'a RemoteFile> {
    let title = normalize(&episode.title);
    if title.is_empty() {
        return None;
    }

    remote_files
        .iter()
        .find(|file| normalize(&file.title) == title && belongs_to_show(file, show))
}
