use serde_json::json;

use crate::common::{GZIP_ARCHIVE, TestApp, routes};

mod resources {
    use super::*;

    #[tokio::test]
    async fn created_application_is_listed_and_shown() {
        let app = TestApp::spawn().await;

        let res = app
            .post(
                &routes::applications(),
                &json!({
                    "name": "web",
                    "routes": ["web.example.com"],
                    "instances": 2,
                    "environment": {"MODE": "prod"}
                }),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "web");
        assert_eq!(res.body["created_by"], "alice");
        assert_eq!(res.body["instances"], 2);
        assert_eq!(res.body["status"], "created");

        let list = app.get(&routes::applications()).await;
        assert_eq!(list.status, 200);
        assert_eq!(list.body.as_array().unwrap().len(), 1);

        let show = app.get(&routes::application("web")).await;
        assert_eq!(show.status, 200);
        assert_eq!(show.body["environment"]["MODE"], "prod");
        assert!(show.body["workload"].is_null());
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app
            .post(&routes::applications(), &json!({"name": "web"}))
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.error_title(), "application 'web' already exists");
    }

    #[tokio::test]
    async fn invalid_name_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post(&routes::applications(), &json!({"name": "Not Valid"}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["errors"][0]["status"], 400);
    }

    #[tokio::test]
    async fn requests_without_a_principal_are_unauthorized() {
        let app = TestApp::spawn().await;

        let res = app
            .post_anonymous(&routes::applications(), &json!({"name": "web"}))
            .await;

        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn missing_application_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::application("ghost")).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.error_title(), "application 'ghost' does not exist");
    }

    #[tokio::test]
    async fn update_changes_spec_without_deploying() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app
            .patch(&routes::application("web"), &json!({"instances": 3}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["instances"], 3);
        assert_eq!(res.body["status"], "created");
    }
}

mod upload {
    use super::*;

    #[tokio::test]
    async fn archive_upload_returns_blob_uid() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app.upload("web", GZIP_ARCHIVE.to_vec()).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["blobuid"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn non_archive_upload_is_rejected() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app.upload("web", b"just some text".to_vec()).await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn upload_to_missing_application_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.upload("ghost", GZIP_ARCHIVE.to_vec()).await;

        assert_eq!(res.status, 404);
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn batch_delete_reports_unbound_dependents() {
        let app = TestApp::spawn().await;
        app.deployed_app("web").await;
        app.create_app("worker").await;
        app.create_dependent("configuration", "settings", json!({"k": "v"}))
            .await;
        app.create_dependent("service", "db", json!({})).await;
        assert_eq!(app.bind("web", "configuration", &["settings"]).await.status, 200);
        assert_eq!(app.bind("worker", "service", &["db"]).await.status, 200);

        let res = app.delete_applications(&["web", "worker"]).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["unboundconfigurations"], json!(["settings"]));
        assert_eq!(res.body["unboundservices"], json!(["db"]));
        assert!(res.body.get("errors").is_none());
        assert_eq!(app.get(&routes::application("web")).await.status, 404);
        assert_eq!(app.get(&routes::application("worker")).await.status, 404);

        let settings = app.get(&routes::dependent("configuration", "settings")).await;
        assert_eq!(settings.status, 200);
        assert_eq!(settings.body["boundapps"], json!([]));
    }

    #[tokio::test]
    async fn batch_delete_continues_past_missing_applications() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app.delete_applications(&["ghost", "web"]).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.get(&routes::application("web")).await.status, 404);
        let errors = res.body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["status"], 404);
        assert_eq!(errors[0]["title"], "application 'ghost' does not exist");
        assert_eq!(errors[0]["details"], "");
    }

    #[tokio::test]
    async fn deleting_only_missing_applications_fails() {
        let app = TestApp::spawn().await;

        let res = app.delete_applications(&["ghost", "phantom"]).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn batch_delete_requires_names() {
        let app = TestApp::spawn().await;

        let res = app.delete_applications(&[]).await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn single_delete_removes_application() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app.delete(&routes::application("web")).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.get(&routes::applications()).await.body, json!([]));
    }
}
