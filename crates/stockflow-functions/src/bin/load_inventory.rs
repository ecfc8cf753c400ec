use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use stockflow_functions::adapters::aws::{DynamoInventory, S3Reader};
use stockflow_functions::handlers::FunctionResponse;
use stockflow_functions::handlers::loader::handle_upload;

struct Clients {
    reader: S3Reader,
    table: DynamoInventory,
}

async fn handle_request(clients: &Clients, event: LambdaEvent<Value>) -> Result<FunctionResponse, Error> {
    Ok(handle_upload(&event.payload, &clients.reader, &clients.table).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    stockflow_functions::init_tracing();

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let clients = Clients {
        reader: S3Reader::new(aws_sdk_s3::Client::new(&config)),
        table: DynamoInventory::new(
            aws_sdk_dynamodb::Client::new(&config),
            stockflow_functions::table_name_from_env(),
        ),
    };
    let clients = &clients;

    lambda_runtime::run(service_fn(move |event| async move { handle_request(clients, event).await })).await
}
