// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod download;
mod filename;
mod pipeline;

pub use download::{ARTWORK_TIMEOUT, ASSET_TIMEOUT, download_to_file};
pub use filename::{artwork_extension, audio_extension, remote_path, scratch_stem};
pub use pipeline::{
    IndexingBackoff, MAX_COMMENT_LENGTH, PipelineOptions, UploadOutcome, UploadPipeline,
    episode_comment,
};
