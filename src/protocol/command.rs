use crate::{Error, Result};
use crate::amf::{Amf0Value, AmfCodec};

/// Positional view of a command message payload:
/// name, transaction id, command object, then optional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub command_object: Amf0Value,
    pub arguments: Vec<Amf0Value>,
}

impl RtmpCommand {
    /// Create new command
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            command_object: Amf0Value::Null,
            arguments: Vec::new(),
        }
    }

    pub fn with_object(mut self, object: Amf0Value) -> Self {
        self.command_object = object;
        self
    }

    pub fn with_argument(mut self, argument: Amf0Value) -> Self {
        self.arguments.push(argument);
        self
    }

    /// First argument, which carries the info object of
    /// `_result`/`_error`/`onStatus` replies
    pub fn info(&self) -> Option<&Amf0Value> {
        self.arguments.first()
    }

    pub fn encode(&self, codec: &dyn AmfCodec) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(3 + self.arguments.len());
        values.push(Amf0Value::String(self.name.clone()));
        values.push(Amf0Value::Number(self.transaction_id));
        values.push(self.command_object.clone());
        values.extend(self.arguments.iter().cloned());
        codec.encode(&values)
    }

    pub fn decode(data: &[u8], codec: &dyn AmfCodec) -> Result<Self> {
        let mut values = codec.decode(data)?.into_iter();

        let name = match values.next() {
            Some(Amf0Value::String(s)) | Some(Amf0Value::LongString(s)) => s,
            _ => return Err(Error::amf_decode("Command name must be string")),
        };

        // Some peers omit the transaction id on notifications
        let transaction_id = match values.next() {
            Some(Amf0Value::Number(n)) => n,
            None => 0.0,
            Some(_) => return Err(Error::amf_decode("Transaction ID must be number")),
        };

        let command_object = values.next().unwrap_or(Amf0Value::Null);

        Ok(RtmpCommand {
            name,
            transaction_id,
            command_object,
            arguments: values.collect(),
        })
    }
}
