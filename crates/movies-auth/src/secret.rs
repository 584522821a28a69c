use std::path::Path;

use tokio::{fs, io::AsyncWriteExt as _};
use tracing::info;

use crate::error::{Error, Result};

pub const SECRET_LEN: usize = 32;
const SECRET_FILE: &str = "secret";

/// Loads token signing secret from `data_dir`, generating a new random one on first use
pub async fn load_or_create_secret(data_dir: &Path) -> Result<Vec<u8>> {
    let secret_file = data_dir.join(SECRET_FILE);

    let secret = if fs::try_exists(&secret_file).await? {
        fs::read(&secret_file).await?
    } else {
        let random_bytes = rand::random::<[u8; SECRET_LEN]>();
        #[cfg(unix)]
        let mut file = {
            use std::fs::OpenOptions;
            use std::os::unix::fs::OpenOptionsExt;
            {
                // Only current user may read the secret
                let _f = OpenOptions::new()
                    .mode(0o600)
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&secret_file)?;
            }
            fs::File::options().write(true).open(&secret_file).await?
        };
        #[cfg(not(unix))]
        let mut file = fs::File::create(&secret_file).await?;

        file.write_all(&random_bytes).await?;
        file.flush().await?;
        info!("Generated new token secret in {secret_file:?}");
        random_bytes.to_vec()
    };

    if secret.len() < SECRET_LEN {
        return Err(Error::InvalidSecret("secret file is too short"));
    }
    Ok(secret)
}
