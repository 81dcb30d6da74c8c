use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
    assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
    assert_eq!(AppError::auth("auth", "no").http_status(), 401);
    assert_eq!(AppError::forbidden("forbidden", "role").http_status(), 403);
    assert_eq!(AppError::domain("domain_error", "dup").http_status(), 200);
    assert_eq!(AppError::upstream("backend_status", "down").http_status(), 502);
    assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
}

#[test]
fn client_errors_fold_into_app_errors() {
    let e: AppError = ClientError::Unauthorized.into();
    assert_eq!(e.http_status(), 401);

    let e: AppError = ClientError::Domain("Alias already taken".into()).into();
    assert_eq!(e.code_str(), "domain_error");
    assert_eq!(e.message(), "Alias already taken");

    let e: AppError = ClientError::Http { status: 503 }.into();
    assert_eq!(e.code_str(), "backend_status");
    assert_eq!(e.http_status(), 502);
}

#[test]
fn only_domain_messages_reach_the_user_verbatim() {
    assert_eq!(ClientError::Domain("Department exists".into()).user_message(), "Department exists");
    assert_eq!(ClientError::Transport("connection refused".into()).user_message(), GENERIC_FAILURE);
    assert_eq!(ClientError::Decode("eof".into()).user_message(), GENERIC_FAILURE);
    assert_eq!(ClientError::Http { status: 500 }.user_message(), GENERIC_FAILURE);
}

#[test]
fn envelope_shape() {
    let v = AppError::forbidden("forbidden", "tab not available").envelope();
    assert_eq!(v["error"], "forbidden");
    assert_eq!(v["message"], "tab not available");
}
