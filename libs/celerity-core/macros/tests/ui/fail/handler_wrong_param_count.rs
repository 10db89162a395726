use celerity_core::contracts::Value;
use celerity_core::HttpException;
use celerity_core_macros::handler;

#[handler(id = "ping", verb = "Get", path = "/ping")]
async fn ping() -> Result<Value, HttpException> {
    Ok(Value::String("pong".to_string()))
}

fn main() {}
