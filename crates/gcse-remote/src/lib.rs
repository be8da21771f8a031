//! The hosting-provider-agnostic remote adapter (C3, `spec.md` §4.3), with a
//! GitHub REST v3 implementation.

mod adapter;
mod error;
mod github;
mod types;

pub use adapter::RemoteAdapter;
pub use error::{into_file_error, into_invalid_repository, RemoteError};
pub use github::GithubAdapter;
pub use types::{EntryKind, RepoInfo, TreeEntry};

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn adapter_against(server: &MockServer) -> GithubAdapter {
        GithubAdapter::with_base_url(None, server.uri()).unwrap()
    }

    #[tokio::test]
    async fn read_repository_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/golang/go"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "go",
                "description": "The Go programming language",
                "stargazers_count": 100000,
                "pushed_at": "2026-01-01T00:00:00Z",
                "default_branch": "master",
            })))
            .mount(&server)
            .await;

        let adapter = adapter_against(&server).await;
        let cancel = CancellationToken::new();
        let info = adapter
            .read_repository("golang", "go", &cancel)
            .await
            .unwrap();
        assert_eq!(info.default_branch, "master");
        assert_eq!(info.stars, 100_000);
    }

    #[tokio::test]
    async fn read_repository_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/golang/nonexistent"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let adapter = adapter_against(&server).await;
        let cancel = CancellationToken::new();
        let err = adapter
            .read_repository("golang", "nonexistent", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound));
    }

    #[tokio::test]
    async fn get_tree_parses_blobs_and_trees() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/golang/go/git/trees/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tree": [
                    {"path": "net/http", "type": "tree", "sha": "t1"},
                    {"path": "net/http/client.go", "type": "blob", "sha": "b1"},
                ]
            })))
            .mount(&server)
            .await;

        let adapter = adapter_against(&server).await;
        let cancel = CancellationToken::new();
        let entries = adapter
            .get_tree("golang", "go", "abc123", true, &cancel)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, EntryKind::Blob);
    }

    #[tokio::test]
    async fn get_file_decodes_base64_content() {
        let server = MockServer::start().await;
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b"package http\n",
        );
        Mock::given(method("GET"))
            .and(path("/repos/golang/go/contents/http.go"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "type": "file",
                "encoding": "base64",
                "content": encoded,
            })))
            .mount(&server)
            .await;

        let adapter = adapter_against(&server).await;
        let cancel = CancellationToken::new();
        let body = adapter
            .get_file("golang", "go", "http.go", &cancel)
            .await
            .unwrap();
        assert_eq!(body, "package http\n");
    }

    #[tokio::test]
    async fn get_file_too_large_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/golang/go/contents/big.go"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(serde_json::json!({"errors": [{"code": "too_large"}]})),
            )
            .mount(&server)
            .await;

        let adapter = adapter_against(&server).await;
        let cancel = CancellationToken::new();
        let err = adapter
            .get_file("golang", "go", "big.go", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::TooLarge));
    }

    #[tokio::test]
    async fn list_directory_parses_files_and_dirs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/golang/go/contents/net"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"path": "net/http", "type": "dir", "sha": "t1"},
                {"path": "net/net.go", "type": "file", "sha": "b1"},
            ])))
            .mount(&server)
            .await;

        let adapter = adapter_against(&server).await;
        let cancel = CancellationToken::new();
        let entries = adapter
            .list_directory("golang", "go", "net", "master", &cancel)
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Tree);
        assert_eq!(entries[1].kind, EntryKind::Blob);
    }

    #[tokio::test]
    async fn branch_with_no_commits_returns_empty_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/golang/go/branches/empty"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let adapter = adapter_against(&server).await;
        let cancel = CancellationToken::new();
        let sha = adapter
            .repo_branch_sha("golang", "go", "empty", &cancel)
            .await
            .unwrap();
        assert_eq!(sha, "");
    }
}
