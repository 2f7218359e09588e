//! User CRUD commands
//!
//! The five commands proxied to the basicCrud API. Each handler is thin
//! delegation: arguments were validated upstream by the router, so a handler
//! only shapes the request, calls the API and formats a text reply.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use trellis_gateway::{
    CommandArgs, CommandDescriptor, CommandHandler, CommandRouter, CommandSchema, FieldDef,
    HandlerError, RouterError,
};

use crate::client::CrudApi;

/// Register every CRUD command on the router.
///
/// A duplicate name is a startup wiring bug and propagates as an error.
pub fn register_commands(router: &CommandRouter, api: Arc<dyn CrudApi>) -> Result<(), RouterError> {
    router.register(
        CommandDescriptor {
            name: "setup_database".to_string(),
            description: "Initialize the database table via basicCrud API".to_string(),
            schema: CommandSchema::empty(),
        },
        Arc::new(SetupDatabase {
            api: Arc::clone(&api),
        }),
    )?;

    router.register(
        CommandDescriptor {
            name: "create_user".to_string(),
            description: "Create a new user via basicCrud API".to_string(),
            schema: user_schema(false),
        },
        Arc::new(CreateUser {
            api: Arc::clone(&api),
        }),
    )?;

    router.register(
        CommandDescriptor {
            name: "get_all_users".to_string(),
            description: "Get all users from the database via basicCrud API".to_string(),
            schema: CommandSchema::empty(),
        },
        Arc::new(GetAllUsers {
            api: Arc::clone(&api),
        }),
    )?;

    router.register(
        CommandDescriptor {
            name: "update_user".to_string(),
            description: "Update an existing user via basicCrud API".to_string(),
            schema: user_schema(true),
        },
        Arc::new(UpdateUser {
            api: Arc::clone(&api),
        }),
    )?;

    router.register(
        CommandDescriptor {
            name: "delete_user".to_string(),
            description: "Delete a user by ID via basicCrud API".to_string(),
            schema: CommandSchema::new(vec![
                FieldDef::integer("id", Some(1), None).describe("User ID to delete")
            ]),
        },
        Arc::new(DeleteUser { api }),
    )?;

    Ok(())
}

/// Argument shape shared by `create_user` and `update_user`.
fn user_schema(with_id: bool) -> CommandSchema {
    let mut fields = Vec::new();
    if with_id {
        fields.push(FieldDef::integer("id", Some(1), None).describe("User ID to update"));
    }
    fields.push(FieldDef::string("isim").describe("User's name"));
    fields.push(FieldDef::integer("yas", Some(0), Some(150)).describe("User's age"));
    fields.push(FieldDef::string_exact("tc", 11).describe("Turkish ID number (11 digits)"));
    CommandSchema::new(fields)
}

fn user_body(args: &CommandArgs) -> Value {
    json!({
        "isim": args.str("isim").unwrap_or_default(),
        "yas": args.int("yas").unwrap_or_default(),
        "tc": args.str("tc").unwrap_or_default(),
    })
}

struct SetupDatabase {
    api: Arc<dyn CrudApi>,
}

#[async_trait]
impl CommandHandler for SetupDatabase {
    async fn run(&self, _args: CommandArgs) -> Result<String, HandlerError> {
        match self.api.call(Method::GET, "/setup", None).await {
            Ok(_) => Ok("Database table created/reset successfully".to_string()),
            Err(e) => Err(HandlerError(format!("Error setting up database: {}", e))),
        }
    }
}

struct CreateUser {
    api: Arc<dyn CrudApi>,
}

#[async_trait]
impl CommandHandler for CreateUser {
    async fn run(&self, args: CommandArgs) -> Result<String, HandlerError> {
        let body = user_body(&args);
        match self.api.call(Method::POST, "/insert", Some(body)).await {
            Ok(_) => Ok(format!(
                "User created successfully: {}, Age: {}, TC: {}",
                args.str("isim").unwrap_or_default(),
                args.int("yas").unwrap_or_default(),
                args.str("tc").unwrap_or_default(),
            )),
            Err(e) => Err(HandlerError(format!("Error creating user: {}", e))),
        }
    }
}

struct GetAllUsers {
    api: Arc<dyn CrudApi>,
}

#[async_trait]
impl CommandHandler for GetAllUsers {
    async fn run(&self, _args: CommandArgs) -> Result<String, HandlerError> {
        let response = self
            .api
            .call(Method::GET, "/users", None)
            .await
            .map_err(|e| HandlerError(format!("Error getting users: {}", e)))?;

        let users: Vec<Value> = serde_json::from_str(&response.body)
            .map_err(|e| HandlerError(format!("Error getting users: {}", e)))?;

        if users.is_empty() {
            return Ok("No users found in the database".to_string());
        }

        let lines: Vec<String> = users.iter().map(format_user).collect();
        Ok(format!("Found {} users:\n{}", users.len(), lines.join("\n")))
    }
}

fn format_user(user: &Value) -> String {
    let id = user
        .get("id")
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let isim = user
        .get("isim")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("N/A");
    let yas = user
        .get("yas")
        .and_then(Value::as_i64)
        .map(|age| age.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let tc = user
        .get("tc")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|tc| !tc.is_empty())
        .unwrap_or("N/A");
    format!("ID: {}, Name: {}, Age: {}, TC: {}", id, isim, yas, tc)
}

struct UpdateUser {
    api: Arc<dyn CrudApi>,
}

#[async_trait]
impl CommandHandler for UpdateUser {
    async fn run(&self, args: CommandArgs) -> Result<String, HandlerError> {
        let id = args.int("id").unwrap_or_default();
        let body = user_body(&args);
        let path = format!("/update/{}", id);
        match self.api.call(Method::PUT, &path, Some(body)).await {
            Ok(_) => Ok(format!(
                "User updated successfully: ID: {}, Name: {}, Age: {}, TC: {}",
                id,
                args.str("isim").unwrap_or_default(),
                args.int("yas").unwrap_or_default(),
                args.str("tc").unwrap_or_default(),
            )),
            Err(e) => Err(HandlerError(format!("Error updating user: {}", e))),
        }
    }
}

struct DeleteUser {
    api: Arc<dyn CrudApi>,
}

#[async_trait]
impl CommandHandler for DeleteUser {
    async fn run(&self, args: CommandArgs) -> Result<String, HandlerError> {
        let id = args.int("id").unwrap_or_default();
        let path = format!("/delete/{}", id);
        match self.api.call(Method::DELETE, &path, None).await {
            Ok(_) => Ok(format!("User with ID {} deleted successfully", id)),
            Err(e) => Err(HandlerError(format!("Error deleting user: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CrudError, CrudResponse};
    use std::sync::Mutex;
    use trellis_gateway::SessionRegistry;

    struct MockApi {
        body: String,
        fail_with: Option<String>,
        calls: Mutex<Vec<(Method, String, Option<Value>)>>,
    }

    impl MockApi {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                fail_with: None,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: String::new(),
                fail_with: Some(body.to_string()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(Method, String, Option<Value>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CrudApi for MockApi {
        async fn call(
            &self,
            method: Method,
            path: &str,
            body: Option<Value>,
        ) -> Result<CrudResponse, CrudError> {
            self.calls
                .lock()
                .unwrap()
                .push((method, path.to_string(), body));
            match &self.fail_with {
                Some(text) => Err(CrudError::Api {
                    status: 500,
                    body: text.clone(),
                }),
                None => Ok(CrudResponse {
                    body: self.body.clone(),
                }),
            }
        }
    }

    fn valid_user_args() -> CommandArgs {
        user_schema(false)
            .validate(&json!({ "isim": "Ayse", "yas": 30, "tc": "12345678901" }))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_commands_registers_all_five() {
        let registry = Arc::new(SessionRegistry::new());
        let router = CommandRouter::new(registry);

        register_commands(&router, MockApi::ok("")).unwrap();

        assert_eq!(
            router.command_names(),
            vec![
                "create_user",
                "delete_user",
                "get_all_users",
                "setup_database",
                "update_user",
            ]
        );
    }

    #[tokio::test]
    async fn test_register_commands_twice_fails() {
        let registry = Arc::new(SessionRegistry::new());
        let router = CommandRouter::new(registry);

        register_commands(&router, MockApi::ok("")).unwrap();
        let err = register_commands(&router, MockApi::ok("")).unwrap_err();
        assert_eq!(err, RouterError::DuplicateCommand("setup_database".into()));
    }

    #[tokio::test]
    async fn test_setup_database_success() {
        let api = MockApi::ok("");
        let handler = SetupDatabase {
            api: Arc::clone(&api) as Arc<dyn CrudApi>,
        };

        let text = handler.run(CommandArgs::default()).await.unwrap();
        assert_eq!(text, "Database table created/reset successfully");
        assert_eq!(api.calls()[0].0, Method::GET);
        assert_eq!(api.calls()[0].1, "/setup");
    }

    #[tokio::test]
    async fn test_create_user_success_text_and_request() {
        let api = MockApi::ok("");
        let handler = CreateUser {
            api: Arc::clone(&api) as Arc<dyn CrudApi>,
        };

        let text = handler.run(valid_user_args()).await.unwrap();
        assert_eq!(
            text,
            "User created successfully: Ayse, Age: 30, TC: 12345678901"
        );

        let (method, path, body) = api.calls().remove(0);
        assert_eq!(method, Method::POST);
        assert_eq!(path, "/insert");
        assert_eq!(
            body.unwrap(),
            json!({ "isim": "Ayse", "yas": 30, "tc": "12345678901" })
        );
    }

    #[tokio::test]
    async fn test_create_user_failure_text() {
        let api = MockApi::failing("duplicate tc");
        let handler = CreateUser {
            api: api as Arc<dyn CrudApi>,
        };

        let err = handler.run(valid_user_args()).await.unwrap_err();
        assert_eq!(err.to_string(), "Error creating user: duplicate tc");
    }

    #[tokio::test]
    async fn test_get_all_users_formats_list() {
        let api = MockApi::ok(
            r#"[{"id":1,"isim":"Ali ","yas":30,"tc":"12345678901"},{"id":2,"isim":"","yas":25,"tc":null}]"#,
        );
        let handler = GetAllUsers {
            api: api as Arc<dyn CrudApi>,
        };

        let text = handler.run(CommandArgs::default()).await.unwrap();
        assert_eq!(
            text,
            "Found 2 users:\n\
             ID: 1, Name: Ali, Age: 30, TC: 12345678901\n\
             ID: 2, Name: N/A, Age: 25, TC: N/A"
        );
    }

    #[tokio::test]
    async fn test_get_all_users_empty() {
        let api = MockApi::ok("[]");
        let handler = GetAllUsers {
            api: api as Arc<dyn CrudApi>,
        };

        let text = handler.run(CommandArgs::default()).await.unwrap();
        assert_eq!(text, "No users found in the database");
    }

    #[tokio::test]
    async fn test_get_all_users_bad_payload_is_failure() {
        let api = MockApi::ok("not json");
        let handler = GetAllUsers {
            api: api as Arc<dyn CrudApi>,
        };

        let err = handler.run(CommandArgs::default()).await.unwrap_err();
        assert!(err.to_string().starts_with("Error getting users:"));
    }

    #[tokio::test]
    async fn test_update_user_builds_path_from_id() {
        let api = MockApi::ok("");
        let handler = UpdateUser {
            api: Arc::clone(&api) as Arc<dyn CrudApi>,
        };
        let args = user_schema(true)
            .validate(&json!({ "id": 7, "isim": "Ali", "yas": 41, "tc": "10987654321" }))
            .unwrap();

        let text = handler.run(args).await.unwrap();
        assert_eq!(
            text,
            "User updated successfully: ID: 7, Name: Ali, Age: 41, TC: 10987654321"
        );

        let (method, path, _) = api.calls().remove(0);
        assert_eq!(method, Method::PUT);
        assert_eq!(path, "/update/7");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let api = MockApi::ok("");
        let handler = DeleteUser {
            api: Arc::clone(&api) as Arc<dyn CrudApi>,
        };
        let args = CommandSchema::new(vec![FieldDef::integer("id", Some(1), None)])
            .validate(&json!({ "id": 3 }))
            .unwrap();

        let text = handler.run(args).await.unwrap();
        assert_eq!(text, "User with ID 3 deleted successfully");
        assert_eq!(api.calls()[0].0, Method::DELETE);
        assert_eq!(api.calls()[0].1, "/delete/3");
    }

    #[test]
    fn test_tc_length_is_validated_before_any_call() {
        let schema = user_schema(false);

        let short = schema.validate(&json!({ "isim": "Ali", "yas": 30, "tc": "12345" }));
        assert!(short.is_err());

        let exact = schema.validate(&json!({ "isim": "Ali", "yas": 30, "tc": "12345678901" }));
        assert!(exact.is_ok());
    }
}
