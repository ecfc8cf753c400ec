use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use stockflow_functions::adapters::AlertPublisher;
use stockflow_functions::adapters::aws::SnsPublisher;
use stockflow_functions::handlers::FunctionResponse;
use stockflow_functions::handlers::notifier::handle_stream;

async fn handle_request(
    publisher: Option<&SnsPublisher>,
    event: LambdaEvent<Value>,
) -> Result<FunctionResponse, Error> {
    let sent = handle_stream(&event.payload, publisher.map(|p| p as &dyn AlertPublisher)).await;
    Ok(FunctionResponse::new(200, format!("Notifications sent: {}", sent)))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    stockflow_functions::init_tracing();

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let publisher = std::env::var(stockflow_functions::TOPIC_ARN_VAR)
        .ok()
        .filter(|arn| !arn.is_empty())
        .map(|arn| SnsPublisher::new(aws_sdk_sns::Client::new(&config), arn));
    let publisher = publisher.as_ref();

    lambda_runtime::run(service_fn(move |event| async move { handle_request(publisher, event).await })).await
}
