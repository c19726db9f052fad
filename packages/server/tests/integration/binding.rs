use serde_json::json;

use crate::common::{TestApp, routes};

mod bind {
    use super::*;

    #[tokio::test]
    async fn bind_reports_names_that_were_already_bound() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        app.create_dependent("configuration", "settings", json!({})).await;
        app.create_dependent("configuration", "flags", json!({})).await;

        let first = app.bind("web", "configuration", &["settings"]).await;
        assert_eq!(first.status, 200, "{}", first.text);
        assert_eq!(first.body["wasbound"], json!([]));

        let second = app
            .bind("web", "configuration", &["settings", "flags"])
            .await;
        assert_eq!(second.status, 200, "{}", second.text);
        assert_eq!(second.body["wasbound"], json!(["settings"]));

        let show = app.get(&routes::application("web")).await;
        assert_eq!(show.body["configurations"], json!(["flags", "settings"]));
        assert_eq!(show.body["services"], json!([]));
    }

    #[tokio::test]
    async fn binding_a_deployed_application_rolls_its_workload() {
        let app = TestApp::spawn().await;
        app.deployed_app("web").await;
        app.create_dependent("service", "db", json!({"url": "postgres://db"}))
            .await;

        let res = app.bind("web", "service", &["db"]).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(app.revision("web").await, Some(2));
    }

    #[tokio::test]
    async fn missing_dependents_are_reported_after_binding_the_rest() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        app.create_dependent("service", "db", json!({})).await;

        let res = app.bind("web", "service", &["db", "ghost"]).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.error_title(), "service 'ghost' does not exist");

        let db = app.get(&routes::dependent("service", "db")).await;
        assert_eq!(db.body["boundapps"], json!(["web"]));
    }

    #[tokio::test]
    async fn empty_name_list_is_rejected() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app.bind("web", "configuration", &[]).await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn binding_to_missing_application_is_not_found() {
        let app = TestApp::spawn().await;
        app.create_dependent("configuration", "settings", json!({})).await;

        let res = app.bind("ghost", "configuration", &["settings"]).await;

        assert_eq!(res.status, 404);
    }
}

mod unbind {
    use super::*;

    #[tokio::test]
    async fn unbind_removes_the_binding() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        app.create_dependent("service", "db", json!({})).await;
        app.bind("web", "service", &["db"]).await;

        let res = app.delete(&routes::binding("web", "service", "db")).await;

        assert_eq!(res.status, 204);
        let db = app.get(&routes::dependent("service", "db")).await;
        assert_eq!(db.body["boundapps"], json!([]));
    }

    #[tokio::test]
    async fn unbinding_an_unbound_dependent_succeeds() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        app.create_dependent("configuration", "settings", json!({})).await;

        let res = app
            .delete(&routes::binding("web", "configuration", "settings"))
            .await;

        assert_eq!(res.status, 204);
    }

    #[tokio::test]
    async fn unbinding_a_missing_dependent_is_not_found() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;

        let res = app
            .delete(&routes::binding("web", "configuration", "ghost"))
            .await;

        assert_eq!(res.status, 404);
    }
}
