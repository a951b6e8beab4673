//! Cart domain module (buyer-facing flow).
//!
//! This crate contains business rules for buyer carts, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod cart;

pub use cart::{
    AddItem, BeginCheckout, Cart, CartCommand, CartEvent, CartId, CartItem, CartItemId,
    CartOpened, CartStatus, CartTransferred, CheckoutStarted, ConfirmPayment, ItemAdded,
    ItemRemoved, MarkTransferred, OpenCart, PaymentConfirmed, RemoveItem,
};
