use std::time::Duration;

use clap::Parser;
use movies_auth::{secret::load_or_create_secret, token::TokenManager};
use movies_types::{
    claim::{ApiClaim, Role},
    config::BackendConfig,
};
use tracing::debug;
use uuid::Uuid;

use crate::commands::Executor;

#[derive(Parser, Debug)]
pub struct IssueTokenCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(short, long, help = "User id (UUID), new random id is generated if not given")]
    user_id: Option<Uuid>,
    #[arg(short, long, num_args=0.., value_delimiter = ',',
        help = "Roles of the user, comma separated or used multiple times, supported roles are admin and trusted_member")]
    roles: Vec<Role>,
    #[arg(
        long,
        default_value = "1 day",
        help = "Token validity in human friendly format (e.g. 1d, 1h, 30m)",
        value_parser = humantime::parse_duration
    )]
    validity: Duration,
}

impl IssueTokenCmd {
    /// Signs token with secret from data directory, same one server uses
    async fn issue(self) -> anyhow::Result<(Uuid, String)> {
        let data_dir = self.backend.data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;
        let secret = load_or_create_secret(&data_dir).await?;
        let tokens = TokenManager::new(&secret, self.validity);
        let user_id = self.user_id.unwrap_or_else(Uuid::new_v4);
        let claim = ApiClaim::new_expired(user_id.to_string(), self.roles);
        let token = tokens.issue(claim)?;
        debug!("Issued token for user {user_id} valid for {:?}", self.validity);
        Ok((user_id, token))
    }
}

impl Executor for IssueTokenCmd {
    async fn run(self) -> anyhow::Result<()> {
        let (user_id, token) = self.issue().await?;
        eprintln!("User id: {user_id}");
        println!("{token}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use movies_types::claim::Authorization as _;

    use super::*;

    #[tokio::test]
    async fn test_issue_token() {
        let dir = tempfile::tempdir().unwrap();
        let user_id = Uuid::new_v4().to_string();
        let cmd = IssueTokenCmd::try_parse_from([
            "issue-token",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--user-id",
            &user_id,
            "--roles",
            "admin,trusted_member",
        ])
        .unwrap();
        let (issued_for, token) = cmd.issue().await.unwrap();
        assert_eq!(issued_for.to_string(), user_id);

        let secret = load_or_create_secret(dir.path()).await.unwrap();
        let claim = TokenManager::new(&secret, Duration::from_secs(60))
            .validate::<ApiClaim>(&token)
            .unwrap();
        assert_eq!(claim.sub, user_id);
        assert!(claim.has_all_roles(&[Role::Admin, Role::TrustedMember]));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let res = IssueTokenCmd::try_parse_from(["issue-token", "--roles", "superuser"]);
        assert!(res.is_err());
    }
}
