pub mod foundation_synca;
