use apicache_core::{ApiClient, ApiError, ApiRequest, Method, RequestOptions};
use serde_json::Value;

use super::super::args::{BodyArgs, DeleteArgs, GetArgs, GlobalArgs};
use super::context::{open_session, print_json};

fn options(client: &ApiClient, headers: Vec<(String, String)>) -> RequestOptions {
    let mut opts = client.default_options();
    opts.headers.extend(headers);
    opts
}

fn parse_body(raw: &str) -> Result<Value, ApiError> {
    serde_json::from_str(raw).map_err(|e| ApiError::InvalidRequest {
        message: format!("--data is not valid JSON: {}", e),
    })
}

pub async fn cmd_get(global: &GlobalArgs, args: GetArgs) -> anyhow::Result<()> {
    let session = open_session(global)?;
    let mut opts = options(&session.client, args.headers);
    if args.no_cache {
        opts = opts.no_cache();
    }
    if let Some(minutes) = args.ttl_minutes {
        opts = opts.with_cache_duration_minutes(minutes);
    }

    let response = session.client.get(&args.url, opts).await?;
    print_json(&response)
}

pub async fn cmd_post(global: &GlobalArgs, args: BodyArgs) -> anyhow::Result<()> {
    send_with_body(global, Method::Post, args).await
}

pub async fn cmd_put(global: &GlobalArgs, args: BodyArgs) -> anyhow::Result<()> {
    send_with_body(global, Method::Put, args).await
}

pub async fn cmd_delete(global: &GlobalArgs, args: DeleteArgs) -> anyhow::Result<()> {
    let session = open_session(global)?;
    let opts = options(&session.client, args.headers);
    let response = session.client.delete(&args.url, opts).await?;
    print_json(&response)
}

async fn send_with_body(global: &GlobalArgs, method: Method, args: BodyArgs) -> anyhow::Result<()> {
    let body = args.data.as_deref().map(parse_body).transpose()?;
    let session = open_session(global)?;
    let opts = options(&session.client, args.headers);

    let response = match (method, body) {
        (Method::Post, Some(body)) => session.client.post(&args.url, &body, opts).await?,
        (Method::Put, Some(body)) => session.client.put(&args.url, &body, opts).await?,
        (method, _) => {
            let request = ApiRequest::new(method, args.url).with_options(opts);
            session.client.request(request).await?
        }
    };
    print_json(&response)
}
