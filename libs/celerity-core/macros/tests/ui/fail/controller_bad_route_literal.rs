use celerity_core::contracts::Value;
use celerity_core::HttpException;
use celerity_core::HandlerContext;
use celerity_core_macros::controller;

struct Widgets;

#[controller(prefix = "/widgets")]
impl Widgets {
    #[get(not_a_string_literal)]
    async fn get_one(&self, _ctx: HandlerContext) -> Result<Value, HttpException> {
        Ok(Value::String("ok".to_string()))
    }
}

fn main() {}
