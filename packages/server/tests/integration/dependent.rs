use serde_json::json;

use crate::common::{TestApp, routes};

mod resources {
    use super::*;

    #[tokio::test]
    async fn configurations_and_services_are_listed_separately() {
        let app = TestApp::spawn().await;
        app.create_dependent("configuration", "settings", json!({"a": "1"}))
            .await;
        app.create_dependent("service", "db", json!({})).await;

        let configurations = app.get(&routes::dependents("configuration")).await;
        assert_eq!(configurations.status, 200);
        let listed = configurations.body.as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["name"], "settings");
        assert_eq!(listed[0]["data"]["a"], "1");

        let services = app.get(&routes::dependents("service")).await;
        assert_eq!(services.body.as_array().unwrap().len(), 1);
        assert_eq!(services.body[0]["kind"], "service");
    }

    #[tokio::test]
    async fn service_keeps_its_catalog_entry() {
        let app = TestApp::spawn().await;

        let res = app
            .post(
                &routes::dependents("service"),
                &json!({"name": "db", "catalogservice": "postgresql"}),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let show = app.get(&routes::dependent("service", "db")).await;
        assert_eq!(show.body["catalogservice"], "postgresql");
        assert_eq!(show.body["created_by"], "alice");
    }

    #[tokio::test]
    async fn duplicate_name_is_a_conflict() {
        let app = TestApp::spawn().await;
        app.create_dependent("configuration", "settings", json!({})).await;

        let res = app
            .post(
                &routes::dependents("configuration"),
                &json!({"name": "settings"}),
            )
            .await;

        assert_eq!(res.status, 409);
    }

    #[tokio::test]
    async fn same_name_may_exist_in_both_kinds() {
        let app = TestApp::spawn().await;
        app.create_dependent("configuration", "db", json!({})).await;

        let res = app
            .post(&routes::dependents("service"), &json!({"name": "db"}))
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn bound_dependent_is_not_deleted_without_unbind() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        app.create_app("api").await;
        app.create_dependent("configuration", "settings", json!({})).await;
        app.bind("web", "configuration", &["settings"]).await;
        app.bind("api", "configuration", &["settings"]).await;

        let res = app
            .delete(&routes::dependent("configuration", "settings"))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.error_title(), "bound applications exist");
        assert_eq!(res.body["errors"][0]["details"], "api,web");
        assert_eq!(
            app.get(&routes::dependent("configuration", "settings"))
                .await
                .status,
            200
        );
    }

    #[tokio::test]
    async fn unbind_flag_cascades_the_delete() {
        let app = TestApp::spawn().await;
        app.create_app("web").await;
        app.create_dependent("service", "db", json!({})).await;
        app.bind("web", "service", &["db"]).await;

        let res = app
            .delete_with_body(&routes::dependent("service", "db"), &json!({"unbind": true}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["boundapps"], json!(["web"]));
        assert_eq!(app.get(&routes::dependent("service", "db")).await.status, 404);
        let show = app.get(&routes::application("web")).await;
        assert_eq!(show.body["services"], json!([]));
    }

    #[tokio::test]
    async fn unbound_dependent_is_deleted_without_a_body() {
        let app = TestApp::spawn().await;
        app.create_dependent("configuration", "settings", json!({})).await;

        let res = app
            .delete(&routes::dependent("configuration", "settings"))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["boundapps"], json!([]));
    }

    #[tokio::test]
    async fn deleting_a_missing_dependent_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.delete(&routes::dependent("service", "ghost")).await;

        assert_eq!(res.status, 404);
    }
}

mod update {
    use super::*;

    async fn bound_configuration(app: &TestApp) {
        app.deployed_app("web").await;
        app.create_dependent("configuration", "settings", json!({"level": "info"}))
            .await;
        assert_eq!(app.bind("web", "configuration", &["settings"]).await.status, 200);
        assert_eq!(app.revision("web").await, Some(2));
    }

    #[tokio::test]
    async fn changed_configuration_restarts_bound_applications() {
        let app = TestApp::spawn().await;
        bound_configuration(&app).await;

        let res = app
            .patch(
                &routes::dependent("configuration", "settings"),
                &json!({"edit": {"level": "debug"}}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"], json!({"level": "debug"}));
        assert_eq!(res.body["restarted"], json!(["web"]));
        assert_eq!(app.revision("web").await, Some(3));
    }

    #[tokio::test]
    async fn unchanged_configuration_does_not_restart() {
        let app = TestApp::spawn().await;
        bound_configuration(&app).await;

        let res = app
            .patch(
                &routes::dependent("configuration", "settings"),
                &json!({"edit": {"level": "info"}}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["restarted"], json!([]));
        assert_eq!(app.revision("web").await, Some(2));
    }

    #[tokio::test]
    async fn explicit_restart_false_wins_over_a_change() {
        let app = TestApp::spawn().await;
        bound_configuration(&app).await;

        let res = app
            .put(
                &routes::dependent("configuration", "settings"),
                &json!({"data": {"level": "warn"}, "restart": false}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"], json!({"level": "warn"}));
        assert_eq!(res.body["restarted"], json!([]));
        assert_eq!(app.revision("web").await, Some(2));
    }

    #[tokio::test]
    async fn change_skipped_once_is_not_restarted_later() {
        let app = TestApp::spawn().await;
        bound_configuration(&app).await;
        let path = routes::dependent("configuration", "settings");

        app.put(&path, &json!({"data": {"level": "warn"}, "restart": false}))
            .await;
        let res = app.patch(&path, &json!({"edit": {"level": "warn"}})).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["restarted"], json!([]));
    }

    #[tokio::test]
    async fn service_update_restarts_even_without_change() {
        let app = TestApp::spawn().await;
        app.deployed_app("web").await;
        app.create_dependent("service", "db", json!({"url": "postgres://db"}))
            .await;
        app.bind("web", "service", &["db"]).await;

        let res = app
            .patch(&routes::dependent("service", "db"), &json!({}))
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["restarted"], json!(["web"]));
        assert_eq!(app.revision("web").await, Some(3));
    }

    #[tokio::test]
    async fn patch_removes_keys_before_setting_new_ones() {
        let app = TestApp::spawn().await;
        app.create_dependent("configuration", "settings", json!({"a": "1", "b": "2"}))
            .await;

        let res = app
            .patch(
                &routes::dependent("configuration", "settings"),
                &json!({"remove": ["a"], "edit": {"c": "3"}}),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"], json!({"b": "2", "c": "3"}));
    }

    #[tokio::test]
    async fn updating_a_missing_dependent_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .put(
                &routes::dependent("configuration", "ghost"),
                &json!({"data": {}}),
            )
            .await;

        assert_eq!(res.status, 404);
    }
}
