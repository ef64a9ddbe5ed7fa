use crate::models::booking::{Booking, BookingStatus};
use crate::notify::{Channel, Notification};
use crate::pricing::{format_cents, PricingType};

#[derive(Debug, Clone)]
pub struct TemplateContext {
    pub business_name: String,
    pub tracking_url: String,
}

impl TemplateContext {
    pub fn new(business_name: impl Into<String>, tracking_url: impl Into<String>) -> Self {
        Self {
            business_name: business_name.into(),
            tracking_url: tracking_url.into(),
        }
    }

    /// Tracking page link keyed by booking id and the customer's email.
    pub fn tracking_link(&self, booking: &Booking) -> String {
        let email: String = url::form_urlencoded::byte_serialize(booking.email.as_bytes()).collect();
        format!(
            "{}/track.html?id={}&email={}",
            self.tracking_url.trim_end_matches('/'),
            booking.id,
            email
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInfo {
    pub title: &'static str,
    pub status_text: &'static str,
    pub message: &'static str,
    pub next_steps: &'static str,
}

pub fn status_info(status: BookingStatus) -> StatusInfo {
    match status {
        BookingStatus::Pending => StatusInfo {
            title: "Order Received",
            status_text: "Pending Confirmation",
            message: "We've received your laundry order and will confirm it shortly.",
            next_steps: "You'll receive a confirmation once we schedule your pickup.",
        },
        BookingStatus::Confirmed => StatusInfo {
            title: "Pickup Confirmed",
            status_text: "Confirmed",
            message: "Great news! Your laundry pickup has been confirmed.",
            next_steps: "Please have your laundry bag(s) ready by the door on the scheduled pickup date and time.",
        },
        BookingStatus::InProgress => StatusInfo {
            title: "Processing Your Laundry",
            status_text: "In Progress",
            message: "We've picked up your laundry and it's currently being washed, dried, and folded with care.",
            next_steps: "Your fresh, clean laundry will be delivered back to you soon!",
        },
        BookingStatus::Completed => StatusInfo {
            title: "Order Complete!",
            status_text: "Completed",
            message: "Your laundry order is complete and has been delivered!",
            next_steps: "We hope you enjoy your fresh, clean laundry. See you next time!",
        },
        BookingStatus::Cancelled => StatusInfo {
            title: "Order Cancelled",
            status_text: "Cancelled",
            message: "Your laundry order has been cancelled.",
            next_steps: "If you have any questions or would like to place a new order, please contact us.",
        },
    }
}

/// Strips non-digits, assumes a US number for ten digits, and prefixes `+`.
pub fn format_phone_e164(phone: &str) -> String {
    let mut digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        digits.insert(0, '1');
    }
    format!("+{digits}")
}

fn quantity_line(booking: &Booking) -> String {
    match booking.pricing_type {
        PricingType::PerBag => format!("Bags: {}", booking.number_of_bags),
        PricingType::PerItem => {
            let count: u64 = booking.items.iter().map(|line| u64::from(line.quantity)).sum();
            format!("Items: {count}")
        }
    }
}

fn pickup_time(booking: &Booking) -> &'static str {
    booking.pickup_time.map_or("TBD", |window| window.time_range())
}

pub fn confirmation_sms(ctx: &TemplateContext, booking: &Booking, service_name: &str) -> Notification {
    let body = format!(
        "{business}: Your laundry pickup is confirmed!\n\
         Order #{reference}\n\
         Service: {service_name}\n\
         {quantity}\n\
         Date: {date}\n\
         Time: {time}\n\
         Total: {total}\n\
         \n\
         Track: {link}\n\
         \n\
         Reply STOP to unsubscribe",
        business = ctx.business_name,
        reference = booking.reference(),
        quantity = quantity_line(booking),
        date = booking.pickup_date,
        time = pickup_time(booking),
        total = format_cents(booking.total_price),
        link = ctx.tracking_link(booking),
    );

    Notification {
        channel: Channel::Sms,
        to: format_phone_e164(&booking.phone),
        subject: None,
        body,
    }
}

pub fn confirmation_email(
    ctx: &TemplateContext,
    booking: &Booking,
    service_name: &str,
) -> Notification {
    let mut body = format!(
        "Hi {name},\n\n\
         Thanks for booking with {business}. Here are your pickup details:\n\n\
         Order: #{reference}\n\
         Service: {service_name}\n\
         {quantity}\n\
         Pickup date: {date}\n\
         Pickup time: {time}\n\
         Address: {address}\n",
        name = booking.name,
        business = ctx.business_name,
        reference = booking.reference(),
        quantity = quantity_line(booking),
        date = booking.pickup_date,
        time = pickup_time(booking),
        address = booking.address,
    );

    if let Some(code) = &booking.promo_code {
        body.push_str(&format!(
            "Subtotal: {}\nPromo {code}: -{}\n",
            format_cents(booking.subtotal),
            format_cents(booking.discount_amount)
        ));
    }
    body.push_str(&format!(
        "Total: {}\n\nTrack your order: {}\n",
        format_cents(booking.total_price),
        ctx.tracking_link(booking)
    ));

    Notification {
        channel: Channel::Email,
        to: booking.email.clone(),
        subject: Some(format!("Booking Confirmed - {}", ctx.business_name)),
        body,
    }
}

pub fn status_sms(ctx: &TemplateContext, booking: &Booking) -> Notification {
    let business = &ctx.business_name;
    let reference = booking.reference();
    let body = match booking.status {
        BookingStatus::Confirmed => format!(
            "{business}: Order #{reference} confirmed! We'll pick up your laundry on {}.",
            booking.pickup_date
        ),
        BookingStatus::InProgress => format!(
            "{business}: We've picked up Order #{reference}! Your laundry is being processed."
        ),
        BookingStatus::Completed => format!(
            "{business}: Order #{reference} is ready for delivery! Thank you for using {business}."
        ),
        BookingStatus::Cancelled => format!(
            "{business}: Order #{reference} has been cancelled. Contact us if you have questions."
        ),
        BookingStatus::Pending => format!(
            "{business}: Order #{reference} status updated to: {}",
            booking.status
        ),
    };

    Notification {
        channel: Channel::Sms,
        to: format_phone_e164(&booking.phone),
        subject: None,
        body,
    }
}

pub fn status_email(ctx: &TemplateContext, booking: &Booking) -> Notification {
    let info = status_info(booking.status);
    let reference = booking.reference();
    let body = format!(
        "Hi {name},\n\n\
         {message}\n\n\
         Order: #{reference}\n\
         Status: {status_text}\n\
         Pickup date: {date}\n\
         Total: {total}\n\n\
         {next_steps}\n\n\
         Track your order: {link}\n\n\
         {business}\n",
        name = booking.name,
        message = info.message,
        status_text = info.status_text,
        date = booking.pickup_date,
        total = format_cents(booking.total_price),
        next_steps = info.next_steps,
        link = ctx.tracking_link(booking),
        business = ctx.business_name,
    );

    Notification {
        channel: Channel::Email,
        to: booking.email.clone(),
        subject: Some(format!("{} - Order #{reference}", info.title)),
        body,
    }
}
