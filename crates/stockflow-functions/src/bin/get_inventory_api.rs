use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use stockflow_functions::adapters::aws::DynamoInventory;
use stockflow_functions::handlers::ApiResponse;
use stockflow_functions::handlers::query::handle_query;

async fn handle_request(table: &DynamoInventory, event: LambdaEvent<Value>) -> Result<ApiResponse, Error> {
    Ok(handle_query(&event.payload, table).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    stockflow_functions::init_tracing();

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let table = DynamoInventory::new(
        aws_sdk_dynamodb::Client::new(&config),
        stockflow_functions::table_name_from_env(),
    );
    let table = &table;

    lambda_runtime::run(service_fn(move |event| async move { handle_request(table, event).await })).await
}
