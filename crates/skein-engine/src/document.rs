//! Document descriptors and the tags attached to chunk and manifest blobs.

use skein_types::{BlobId, ChunkSetId, OwnershipMetadata, Tag, now_millis, tags};

/// Identifies the document being transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Keys the resume checkpoint.
    pub project_id: String,
    pub project_name: String,
    pub author: String,
    pub folder: Option<String>,
    /// Root of the document's version chain, when this is a revision.
    pub root_tx_id: Option<BlobId>,
}

impl DocumentInfo {
    pub fn new(
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            project_name: project_name.into(),
            author: author.into(),
            folder: None,
            root_tx_id: None,
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn with_root(mut self, root_tx_id: BlobId) -> Self {
        self.root_tx_id = Some(root_tx_id);
        self
    }
}

/// Extra manifest attributes that chunk blobs do not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOptions {
    /// Kind of document, e.g. `project` or `thumbnail`.
    pub data_type: String,
    pub thumbnail_id: Option<BlobId>,
    pub ownership: Option<OwnershipMetadata>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            data_type: "project".to_string(),
            thumbnail_id: None,
            ownership: None,
        }
    }
}

fn common_tags(
    app_name: &str,
    data_type: &str,
    doc: &DocumentInfo,
    chunk_set_id: &ChunkSetId,
    total_chunks: u32,
) -> Vec<Tag> {
    let mut out = vec![
        Tag::new(tags::APP_NAME, app_name),
        Tag::new(tags::DATA_TYPE, data_type),
        Tag::new(tags::CONTENT_TYPE, tags::JSON_CONTENT_TYPE),
        Tag::new(tags::PROJECT_ID, doc.project_id.as_str()),
        Tag::new(tags::PROJECT_NAME, doc.project_name.as_str()),
        Tag::new(tags::AUTHOR, doc.author.as_str()),
        Tag::new(tags::CHUNK_SET_ID, chunk_set_id.as_str()),
        Tag::new(tags::TOTAL_CHUNKS, total_chunks.to_string()),
        Tag::new(tags::CREATED_AT, now_millis().to_string()),
    ];
    if let Some(folder) = &doc.folder {
        out.push(Tag::new(tags::FOLDER, folder.as_str()));
    }
    if let Some(root) = &doc.root_tx_id {
        out.push(Tag::new(tags::ROOT_TX_ID, root.as_str()));
    }
    out
}

/// Tags for one chunk blob.
pub fn chunk_tags(
    app_name: &str,
    doc: &DocumentInfo,
    chunk_set_id: &ChunkSetId,
    index: u32,
    total_chunks: u32,
) -> Vec<Tag> {
    let mut out = common_tags(app_name, tags::DATA_TYPE_CHUNK, doc, chunk_set_id, total_chunks);
    out.push(Tag::new(tags::CHUNK_INDEX, index.to_string()));
    out
}

/// Tags for a manifest blob.
pub fn manifest_tags(
    app_name: &str,
    doc: &DocumentInfo,
    chunk_set_id: &ChunkSetId,
    total_chunks: u32,
    options: &ManifestOptions,
) -> Vec<Tag> {
    let mut out = common_tags(
        app_name,
        tags::DATA_TYPE_MANIFEST,
        doc,
        chunk_set_id,
        total_chunks,
    );
    out.push(Tag::new(tags::CONTENT_KIND, options.data_type.as_str()));
    if let Some(thumbnail) = &options.thumbnail_id {
        out.push(Tag::new(tags::THUMBNAIL_ID, thumbnail.as_str()));
    }
    if let Some(ownership) = &options.ownership {
        out.push(Tag::new(tags::OWNER, ownership.owner.as_str()));
        if let Some(signature) = &ownership.signature {
            out.push(Tag::new(tags::OWNER_SIGNATURE, signature.as_str()));
        }
    }
    out
}
