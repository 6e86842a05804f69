//! Data model: tickets, lanes, priorities, and validated ids.

pub mod ticket;
pub mod ticket_id;

pub use ticket::{Grooming, GroomingStatus, Lane, Priority, Ticket, TicketDraft, TicketPatch};
pub use ticket_id::TicketId;
