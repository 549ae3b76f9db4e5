//! Almacenamiento de fotos de entregas
//!
//! Las fotos se suben antes de registrar la entrega; la entrega solo guarda
//! la URL resultante.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::utils::errors::{StoreError, StoreResult};

/// Carpeta lógica donde se guardan las fotos
pub const PHOTO_FOLDER: &str = "entregas";

/// Foto recibida del cliente
#[derive(Debug, Clone)]
pub struct PhotoPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl PhotoPayload {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.unwrap_or_else(|| "image/jpeg".to_string()),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            "image/heic" => "heic",
            _ => "jpg",
        }
    }

    /// Nombre único del objeto: `<millis>-<uuid>.<ext>`
    pub fn object_name(&self) -> String {
        format!("{}-{}.{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple(), self.extension())
    }
}

/// Colaborador externo que guarda fotos y devuelve su URL pública
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn upload(&self, photo: PhotoPayload) -> StoreResult<String>;
}

/// Fotos guardadas en un directorio local servido por la propia API
pub struct LocalPhotoStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalPhotoStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PhotoStorage for LocalPhotoStorage {
    async fn upload(&self, photo: PhotoPayload) -> StoreResult<String> {
        if photo.bytes.is_empty() {
            return Err(StoreError::Upload("Photo payload is empty".to_string()));
        }

        let folder = self.root.join(PHOTO_FOLDER);
        let name = photo.object_name();

        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| StoreError::Upload(format!("Cannot create {}: {}", folder.display(), e)))?;
        tokio::fs::write(folder.join(&name), &photo.bytes)
            .await
            .map_err(|e| StoreError::Upload(format!("Cannot write photo {}: {}", name, e)))?;

        debug!("📸 Foto guardada: {} ({} bytes)", name, photo.bytes.len());
        Ok(format!("{}/{}/{}", self.public_base_url, PHOTO_FOLDER, name))
    }
}

/// Fotos subidas con `PUT` a un almacenamiento de objetos por HTTP
pub struct HttpPhotoStorage {
    client: Client,
    upload_url: String,
    public_base_url: String,
}

impl HttpPhotoStorage {
    /// Crear el cliente HTTP; una subida que supera `timeout` es un `Upload` error
    pub fn new(
        upload_url: impl Into<String>,
        public_base_url: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Upload(format!("Cannot build photo upload client: {}", e)))?;

        Ok(Self {
            client,
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PhotoStorage for HttpPhotoStorage {
    async fn upload(&self, photo: PhotoPayload) -> StoreResult<String> {
        if photo.bytes.is_empty() {
            return Err(StoreError::Upload("Photo payload is empty".to_string()));
        }

        let name = photo.object_name();
        let target = format!("{}/{}/{}", self.upload_url, PHOTO_FOLDER, name);

        let response = self
            .client
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, photo.content_type.as_str())
            .body(photo.bytes)
            .send()
            .await
            .map_err(|e| {
                error!("❌ Error subiendo foto a {}: {}", target, e);
                StoreError::Upload(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("❌ Almacenamiento de fotos respondió {} para {}", status, target);
            return Err(StoreError::Upload(format!("Photo storage responded with {}", status)));
        }

        info!("📸 Foto subida: {}", name);
        Ok(format!("{}/{}/{}", self.public_base_url, PHOTO_FOLDER, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("delivery-tracker-photos-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_local_storage_writes_file_and_returns_url() {
        let root = temp_root();
        let storage = LocalPhotoStorage::new(&root, "http://localhost:3000/photos/");

        let url = storage
            .upload(PhotoPayload::new(vec![0xFF, 0xD8, 0xFF], None))
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:3000/photos/entregas/"));
        assert!(url.ends_with(".jpg"));

        let name = url.rsplit('/').next().unwrap();
        let written = tokio::fs::read(root.join(PHOTO_FOLDER).join(name)).await.unwrap();
        assert_eq!(written, vec![0xFF, 0xD8, 0xFF]);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_empty_payload_is_upload_error() {
        let storage = LocalPhotoStorage::new(temp_root(), "http://localhost/photos");
        let err = storage.upload(PhotoPayload::new(Vec::new(), None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Upload(_)));
    }

    #[tokio::test]
    async fn test_http_storage_unreachable_is_upload_error() {
        let storage =
            HttpPhotoStorage::new("http://127.0.0.1:9", "http://cdn.test", Duration::from_secs(5)).unwrap();
        let err = storage
            .upload(PhotoPayload::new(vec![1, 2, 3], Some("image/png".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Upload(_)));
    }

    #[tokio::test]
    async fn test_http_storage_stalled_server_times_out() {
        // Acepta la conexión y nunca responde
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut sockets = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                sockets.push(socket);
            }
        });

        let storage = HttpPhotoStorage::new(
            format!("http://{}", addr),
            "http://cdn.test",
            Duration::from_millis(200),
        )
        .unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            storage.upload(PhotoPayload::new(vec![1, 2, 3], None)),
        )
        .await
        .expect("upload should give up on its own");
        assert!(matches!(result, Err(StoreError::Upload(_))));

        server.abort();
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(PhotoPayload::new(vec![1], Some("image/png".into())).extension(), "png");
        assert_eq!(PhotoPayload::new(vec![1], None).extension(), "jpg");
    }
}
