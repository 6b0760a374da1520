//! Routing of producer modules onto consumer modules through the selector registers of the
//! interconnect module.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::{
  error::{RegMapError, RegMapResult},
  map::FieldLocation,
  module::ModuleSpec,
  register::{RegisterSpec, SelectorSpec, DISCONNECT},
  RegisterMap,
};

/// Name of the module holding every selector register.
pub const INTERCONNECT_MODULE: &str = "wfg_interconnect_top";

static SELECTOR_NAME: OnceCell<Regex> = OnceCell::new();

fn selector_name() -> RegMapResult<&'static Regex> {
  Ok(SELECTOR_NAME.get_or_try_init(|| Regex::new(r"^(?P<consumer>\w+)_(?P<selector>select_\d+)$"))?)
}

/// A resolved route: the selector location and the word that selects the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub location: FieldLocation,

  /// The enumerant selecting the producer.
  pub value: u8,

  /// The full register word to write.
  pub word: u32,
}

/// The interconnect view of a register map.
#[derive(Debug, Clone, Copy)]
pub struct Interconnect<'m> {
  module: &'m ModuleSpec,
}
impl<'m> Interconnect<'m> {
  pub fn new(map: &'m RegisterMap) -> RegMapResult<Self> {
    Ok(Self {
      module: map.module(INTERCONNECT_MODULE)?,
    })
  }

  fn selector_register(&self, consumer: &str, selector: &str) -> RegMapResult<&'m RegisterSpec> {
    let name = format!("{}_{}", consumer, selector);
    match self.module.register(&name) {
      Some(r) if r.is_selector() => Ok(r),
      _ => Err(RegMapError::UnknownRegister {
        module: self.module.name.clone(),
        register: name,
      }),
    }
  }

  /// The routing choices of `consumer`'s `selector` register (e.g. `select_0`).
  pub fn selector(&self, consumer: &str, selector: &str) -> RegMapResult<&'m SelectorSpec> {
    let register = self.selector_register(consumer, selector)?;
    match register.selector() {
      Some(s) => Ok(s),
      None => Err(RegMapError::UnknownRegister {
        module: self.module.name.clone(),
        register: register.name.clone(),
      }),
    }
  }

  /// Resolves the word that routes `producer` into `consumer`.
  pub fn route(&self, consumer: &str, selector: &str, producer: &str) -> RegMapResult<Route> {
    let register = self.selector_register(consumer, selector)?;
    let spec = self.selector(consumer, selector)?;

    let value = spec
      .value(producer)
      .ok_or_else(|| RegMapError::UnknownRoute {
        consumer: consumer.to_owned(),
        selector: selector.to_owned(),
        producer: producer.to_owned(),
      })?;

    let location = FieldLocation {
      address: register.address,
      bits: spec.field().bits(),
    };

    Ok(Route {
      location,
      value,
      word: location.encode(0, u32::from(value))?,
    })
  }

  pub fn disconnect(&self, consumer: &str, selector: &str) -> RegMapResult<Route> {
    self.route(consumer, selector, DISCONNECT)
  }

  /// Every producer label selected by `value`. More than one label is returned when producers
  /// share a physical source select.
  pub fn producers_for(
    &self,
    consumer: &str,
    selector: &str,
    value: u8,
  ) -> RegMapResult<Vec<&'m str>> {
    Ok(self.selector(consumer, selector)?.labels_for(value))
  }

  /// Lists `(consumer, selector)` pairs for every selector register.
  pub fn consumers(&self) -> RegMapResult<Vec<(String, String)>> {
    let re = selector_name()?;
    let mut pairs = Vec::new();

    for register in self.module.iter_selectors() {
      if let Some(caps) = re.captures(&register.name) {
        pairs.push((caps["consumer"].to_owned(), caps["selector"].to_owned()));
      }
    }

    Ok(pairs)
  }
}

#[cfg(test)]
mod tests {
  use super::Interconnect;
  use crate::error::RegMapError;
  use crate::platform::wfg;

  #[test]
  fn routes_stimulus_into_spi() {
    let ic = Interconnect::new(&wfg().unwrap().map).unwrap();

    let route = ic
      .route("wfg_drive_spi_top_1", "select_0", "wfg_stim_mem_top_2")
      .unwrap();

    assert_eq!(0x44001, route.location.address);
    assert_eq!(0x03, route.value);
    assert_eq!(0x03, route.word);
  }

  #[test]
  fn disconnect_is_always_zero() {
    let ic = Interconnect::new(&wfg().unwrap().map).unwrap();

    for (consumer, selector) in ic.consumers().unwrap() {
      let route = ic.disconnect(&consumer, &selector).unwrap();
      assert_eq!(0, route.word);
      assert_eq!(0, route.value);
    }
  }

  #[test]
  fn unknown_producer_is_typed_failure() {
    let ic = Interconnect::new(&wfg().unwrap().map).unwrap();

    assert!(matches!(
      ic.route("wfg_drive_spi_top_0", "select_0", "wfg_drive_uart_top_0"),
      Err(RegMapError::UnknownRoute { .. })
    ));
    assert!(matches!(
      ic.route("wfg_drive_spi_top_7", "select_0", "wfg_stim_mem_top_0"),
      Err(RegMapError::UnknownRegister { .. })
    ));
  }

  #[test]
  fn shared_record_source_reports_both_producers() {
    let ic = Interconnect::new(&wfg().unwrap().map).unwrap();

    let i2c = ic
      .route("wfg_record_mem_top_0", "select_0", "wfg_drive_i2c_top_0")
      .unwrap();
    let i2ct = ic
      .route("wfg_record_mem_top_0", "select_0", "wfg_drive_i2ct_top_0")
      .unwrap();
    assert_eq!(i2c.word, i2ct.word);

    let producers = ic
      .producers_for("wfg_record_mem_top_0", "select_0", 0x21)
      .unwrap();
    assert_eq!(vec!["wfg_drive_i2c_top_0", "wfg_drive_i2ct_top_0"], producers);
  }

  #[test]
  fn lists_consumers() {
    let ic = Interconnect::new(&wfg().unwrap().map).unwrap();

    let consumers = ic.consumers().unwrap();

    assert_eq!(11, consumers.len());
    assert!(consumers.contains(&("wfg_drive_uart_top_1".to_string(), "select_0".to_string())));
  }
}
