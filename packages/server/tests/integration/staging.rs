use std::time::Duration;

use ::common::{AppRef, BuildReport};
use serde_json::json;

use crate::common::{BuildOutcome, GZIP_ARCHIVE, TestApp, routes};

/// Distinct archive contents, so each upload gets its own blob.
fn archive(tag: u8) -> Vec<u8> {
    let mut data = GZIP_ARCHIVE.to_vec();
    data.push(tag);
    data
}

mod stage {
    use super::*;

    #[tokio::test]
    async fn stage_reports_image_and_marks_blob_current() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        let uid = app.upload_blob("web").await;

        let res = app
            .post(&routes::stage("web"), &json!({"blobuid": uid}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let stage_id = res.body["stage"]["id"].as_str().unwrap();
        assert!(
            res.body["image"]
                .as_str()
                .unwrap()
                .starts_with("registry.test/apps/")
        );

        let show = app.get(&routes::application("web")).await;
        assert_eq!(show.body["blobuid"], uid.as_str());
        assert_eq!(show.body["latest_stage"], stage_id);
    }

    #[tokio::test]
    async fn blob_of_another_application_is_rejected() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        app.create_app("api").await;
        let uid = app.upload_blob("api").await;

        let res = app
            .post(&routes::stage("web"), &json!({"blobuid": uid}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.error_title(), "blob app mismatch");
        assert_eq!(res.body["errors"][0]["details"], "expected: web, found: api");
    }

    #[tokio::test]
    async fn omitted_blob_uid_restages_previous_blob() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app.post(&routes::stage("web"), &json!({})).await;
        assert_eq!(res.status, 400);
        assert_eq!(
            res.error_title(),
            "request didn't provide a blobUID and a previous one doesn't exist"
        );

        let uid = app.upload_blob("web").await;
        let first = app.stage("web", &uid).await;
        let res = app.post(&routes::stage("web"), &json!({})).await;

        assert_eq!(res.status, 200, "{}", res.text);
        let second = res.body["stage"]["id"].as_str().unwrap();
        assert_ne!(second, first);
        let run = app.lifecycle.find_stage(second).await.unwrap();
        assert_eq!(run.blob_uid.to_hex(), uid);
    }

    #[tokio::test]
    async fn malformed_blob_uid_is_rejected() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app
            .post(&routes::stage("web"), &json!({"blobuid": "not-hex"}))
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn pending_stage_answers_waiting() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        let uid = app.upload_blob("web").await;
        let stage_id = app.stage("web", &uid).await;

        let res = app.get(&routes::stage_complete(&stage_id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "waiting");
    }

    #[tokio::test]
    async fn complete_waits_for_the_build_to_finish() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        let uid = app.upload_blob("web").await;
        let stage_id = app.stage("web", &uid).await;

        let lifecycle = app.lifecycle.clone();
        let run_id = stage_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            lifecycle
                .builds()
                .complete(&BuildReport::new(run_id, BuildOutcome::Failed))
                .await
                .unwrap();
        });

        let res = app.get(&routes::stage_complete(&stage_id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "failed");
    }

    #[tokio::test]
    async fn unknown_stage_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::stage_complete("missing")).await;

        assert_eq!(res.status, 404);
    }
}

mod deploy {
    use super::*;

    #[tokio::test]
    async fn deploy_applies_workload_with_overrides() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        let uid = app.upload_blob("web").await;
        let stage_id = app.stage("web", &uid).await;
        app.finish_build(&stage_id, BuildOutcome::Succeeded).await;

        let res = app
            .post(
                &routes::deploy("web"),
                &json!({
                    "stage": {"id": stage_id},
                    "routes": ["shop.example.com"],
                    "instances": 3
                }),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["routes"], json!(["shop.example.com"]));

        let show = app.get(&routes::application("web")).await;
        assert_eq!(show.body["status"], "deployed");
        assert_eq!(show.body["instances"], 3);
        assert_eq!(show.body["deployed_stage"], stage_id.as_str());
        assert_eq!(show.body["workload"]["instances"], 3);
        assert_eq!(show.body["workload"]["revision"], 1);
    }

    #[tokio::test]
    async fn failed_stage_cannot_be_deployed() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        let uid = app.upload_blob("web").await;
        let stage_id = app.stage("web", &uid).await;
        app.finish_build(&stage_id, BuildOutcome::Failed).await;

        let res = app
            .post(&routes::deploy("web"), &json!({"stage": {"id": stage_id}}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(app.revision("web").await, None);
    }

    #[tokio::test]
    async fn stage_of_another_application_is_rejected() {
        let app = TestApp::spawn().await;
        let api_stage = app.deployed_app("api").await;
        app.create_app("web").await;

        let res = app
            .post(&routes::deploy("web"), &json!({"stage": {"id": api_stage}}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.error_title(), "stage app mismatch");
    }

    #[tokio::test]
    async fn redeploy_reclaims_superseded_blobs() {
        let app = TestApp::spawn().await;
        app.deployed_app("web").await;

        let second = app.upload("web", archive(2)).await;
        assert_eq!(second.status, 200, "{}", second.text);
        let second_uid = second.body["blobuid"].as_str().unwrap().to_string();
        let stage_id = app.stage("web", &second_uid).await;
        app.finish_build(&stage_id, BuildOutcome::Succeeded).await;

        let res = app
            .post(&routes::deploy("web"), &json!({"stage": {"id": stage_id}}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let remaining = app
            .lifecycle
            .blob_store()
            .list(&AppRef::new(routes::NS, "web"))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].to_hex(), second_uid);
        assert_eq!(app.revision("web").await, Some(2));
    }

    #[tokio::test]
    async fn restart_rolls_the_workload() {
        let app = TestApp::spawn().await;
        app.deployed_app("web").await;

        let res = app.post(&routes::restart("web"), &json!({})).await;

        assert_eq!(res.status, 204);
        assert_eq!(app.revision("web").await, Some(2));
    }

    #[tokio::test]
    async fn restart_requires_a_deployment() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app.post(&routes::restart("web"), &json!({})).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.error_title(), "application 'web' is not deployed");
    }
}
