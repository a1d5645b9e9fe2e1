//! Console command parsing.
//!
//! A line starting with `:` is a command; anything else is fed to the scan
//! surface as if a scanner had typed it.

use std::str::FromStr;

use mart_core::validation::{validate_discount, validate_quantity, validate_sku};
use mart_core::{Money, PaymentMethod, ValidationError};

pub const HELP: &str = "\
Commands:
  <text>                 type text into the search box, then Enter
  :qty <sku> <n>         set a line quantity (0 removes)
  :add <sku> <delta>     adjust a line quantity (+1, -2, ...)
  :rm <sku>              remove a line
  :discount <amount>     set the bill discount (e.g. 12.50)
  :pay <cash|card|upi>   submit the bill
  :label <sku> [copies]  print a shelf label
  :cart                  show the cart
  :clear                 empty the cart
  :reload                refresh the catalog snapshot
  :help                  show this help
  :quit                  exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan(String),
    SetQuantity { sku: String, quantity: i64 },
    Adjust { sku: String, delta: i64 },
    Remove(String),
    Discount(Money),
    Pay(PaymentMethod),
    Label { sku: String, copies: u32 },
    Cart,
    Clear,
    Reload,
    Help,
    Quit,
}

fn invalid(field: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn required<'a>(arg: Option<&'a str>, field: &str) -> Result<&'a str, ValidationError> {
    arg.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

fn sku_arg(arg: Option<&str>) -> Result<String, ValidationError> {
    let sku = required(arg, "sku")?;
    validate_sku(sku)?;
    Ok(sku.to_string())
}

fn int_arg(arg: Option<&str>, field: &str) -> Result<i64, ValidationError> {
    required(arg, field)?
        .trim_start_matches('+')
        .parse()
        .map_err(|_| invalid(field, "expected a whole number"))
}

impl FromStr for Command {
    type Err = ValidationError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Command::Scan(line.to_string()));
        };

        let mut args = rest.split_whitespace();
        let name = args.next().unwrap_or_default();

        let command = match name {
            "qty" => {
                let sku = sku_arg(args.next())?;
                let quantity = int_arg(args.next(), "quantity")?;
                validate_quantity(quantity)?;
                Command::SetQuantity { sku, quantity }
            }
            "add" => {
                let sku = sku_arg(args.next())?;
                let delta = int_arg(args.next(), "delta")?;
                Command::Adjust { sku, delta }
            }
            "rm" => Command::Remove(sku_arg(args.next())?),
            "discount" => {
                let amount: Money = required(args.next(), "amount")?.parse()?;
                validate_discount(amount)?;
                Command::Discount(amount)
            }
            "pay" => Command::Pay(required(args.next(), "payment method")?.parse()?),
            "label" => {
                let sku = sku_arg(args.next())?;
                let copies = match args.next() {
                    Some(n) => n
                        .parse::<u32>()
                        .ok()
                        .filter(|&n| n > 0)
                        .ok_or_else(|| invalid("copies", "expected a positive number"))?,
                    None => 1,
                };
                Command::Label { sku, copies }
            }
            "cart" => Command::Cart,
            "clear" => Command::Clear,
            "reload" => Command::Reload,
            "help" | "?" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            other => return Err(invalid("command", &format!("unknown command ':{}'", other))),
        };

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_is_scan() {
        assert_eq!(
            "8901234567890".parse::<Command>().unwrap(),
            Command::Scan("8901234567890".to_string())
        );
        assert_eq!(
            "milk 1l".parse::<Command>().unwrap(),
            Command::Scan("milk 1l".to_string())
        );
    }

    #[test]
    fn test_quantity_commands() {
        assert_eq!(
            ":qty ABC123 4".parse::<Command>().unwrap(),
            Command::SetQuantity {
                sku: "ABC123".to_string(),
                quantity: 4
            }
        );
        assert_eq!(
            ":add ABC123 +2".parse::<Command>().unwrap(),
            Command::Adjust {
                sku: "ABC123".to_string(),
                delta: 2
            }
        );
        assert!(":qty ABC123 1000".parse::<Command>().is_err());
        assert!(":qty ABC123".parse::<Command>().is_err());
        assert!(":rm".parse::<Command>().is_err());
    }

    #[test]
    fn test_discount_and_pay() {
        assert_eq!(
            ":discount 12.50".parse::<Command>().unwrap(),
            Command::Discount(Money::from_cents(1250))
        );
        assert!(":discount -1".parse::<Command>().is_err());
        assert_eq!(
            ":pay UPI".parse::<Command>().unwrap(),
            Command::Pay(PaymentMethod::Upi)
        );
        assert!(":pay cheque".parse::<Command>().is_err());
    }

    #[test]
    fn test_label_copies() {
        assert_eq!(
            ":label RICE-5KG".parse::<Command>().unwrap(),
            Command::Label {
                sku: "RICE-5KG".to_string(),
                copies: 1
            }
        );
        assert_eq!(
            ":label RICE-5KG 3".parse::<Command>().unwrap(),
            Command::Label {
                sku: "RICE-5KG".to_string(),
                copies: 3
            }
        );
        assert!(":label RICE-5KG 0".parse::<Command>().is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(":frobnicate".parse::<Command>().is_err());
        assert_eq!(":q".parse::<Command>().unwrap(), Command::Quit);
    }
}
