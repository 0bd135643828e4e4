#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ragdesk::config::{parse_config, Config};
use ragdesk::ingest::{IngestSettings, Upload};
use ragdesk::records::{SqliteDocumentStore, SqliteHistoryStore};
use ragdesk::service::{RagService, ServiceParts};
use ragdesk::sqlite_index::SqliteIndex;
use ragdesk::{db, migrate};
use ragdesk_core::embedding::Embedder;
use ragdesk_core::generation::Generator;
use ragdesk_core::Result;

/// Deterministic bag-of-words embedder: each lowercase word is hashed into
/// one of `dims` buckets.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

fn bucket(word: &str, dims: usize) -> usize {
    // FNV-1a
    let mut h: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    (h % dims as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> Option<usize> {
        None
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; self.dims];
                for word in t
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    v[bucket(&word.to_lowercase(), self.dims)] += 1.0;
                }
                v
            })
            .collect())
    }
}

/// Generator that records every prompt and answers with a fixed string.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("generated answer".to_string())
    }
}

pub fn test_config(dir: &Path) -> Config {
    parse_config(&format!(
        r#"
[db]
path = "{}/ragdesk.sqlite"

[chunking]
chunk_size = 120
overlap = 20

[uploads]
max_bytes = 4096
"#,
        dir.display()
    ))
    .unwrap()
}

/// A SQLite-backed service in `dir` with the given fakes.
pub async fn sqlite_service(
    dir: &Path,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    fixed_dims: Option<usize>,
) -> RagService {
    let config = test_config(dir);
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let index = SqliteIndex::open(pool.clone(), embedder.model_name(), fixed_dims)
        .await
        .unwrap();

    RagService::from_parts(
        ServiceParts {
            index: Arc::new(index),
            embedder,
            generator,
            documents: Arc::new(SqliteDocumentStore::new(pool.clone())),
            history: Arc::new(SqliteHistoryStore::new(pool)),
        },
        IngestSettings::from_config(&config),
        config.retrieval.top_k,
    )
}

pub fn text_upload(filename: &str, text: &str) -> Upload {
    Upload {
        filename: filename.to_string(),
        content_type: Some("text/plain".to_string()),
        bytes: text.as_bytes().to_vec(),
    }
}

/// A PDF with one page per entry of `pages`, each showing that phrase in
/// Helvetica.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    // Objects: 1 catalog, 2 pages, 3 font, then (page, content) pairs.
    let page_obj = |i: usize| 4 + 2 * i;
    let content_obj = |i: usize| 5 + 2 * i;
    let total = 3 + 2 * n;

    let mut out = Vec::new();
    let mut offsets = vec![0usize; total + 1];
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets[1] = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets[2] = out.len();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_obj(i))).collect();
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    offsets[3] = out.len();
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, phrase) in pages.iter().enumerate() {
        offsets[page_obj(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_obj(i),
                content_obj(i)
            )
            .as_bytes(),
        );

        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        offsets[content_obj(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_obj(i),
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets.iter().skip(1) {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", total + 1, xref_start)
            .as_bytes(),
    );
    out
}
