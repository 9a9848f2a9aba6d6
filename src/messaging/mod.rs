mod amqp;

pub use amqp::{AmqpTransport, BrokerTransport};
